//! Frame source abstraction for the acquisition driver

use std::time::Duration;

use crate::Result;
use crate::stream::FrameChannel;
use crate::types::Frame;

/// Anything that yields decoded frames, live or simulated.
///
/// Errors keep the meaning they have on [`FrameChannel::next_frame`]: a
/// [`Timeout`](crate::VisionaryError::Timeout) or protocol violation is
/// recoverable, a [`Connection`](crate::VisionaryError::Connection) error ends
/// the source.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    async fn next_frame(&mut self, timeout: Duration) -> Result<Frame>;

    /// Frames lost before reaching this source.
    fn dropped_frames(&self) -> u64 {
        0
    }
}

#[async_trait::async_trait]
impl FrameSource for FrameChannel {
    async fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        FrameChannel::next_frame(self, timeout).await
    }

    fn dropped_frames(&self) -> u64 {
        FrameChannel::dropped_frames(self)
    }
}
