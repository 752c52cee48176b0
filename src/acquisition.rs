//! Continuous acquisition driver
//!
//! Spawns a task that owns a [`FrameSource`], publishes every frame on a watch
//! channel and keeps a [`FailureLog`] of what went wrong along the way.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};

use crate::report::{FailureKind, FailureLog};
use crate::source::FrameSource;
use crate::stream::ThrottleExt;
use crate::types::{Frame, UpdateRate};

const CONTEXT: &str = "continuous acquisition";

/// Tunables for [`Acquisition::spawn`].
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Deadline for each frame
    pub frame_timeout: Duration,
    /// Recoverable errors in a row before the driver gives up
    pub max_consecutive_errors: u32,
    /// Expected device frame rate, used to normalize subscription rates
    pub nominal_fps: f64,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self { frame_timeout: Duration::from_millis(5000), max_consecutive_errors: 10, nominal_fps: 30.0 }
    }
}

/// Spawns and manages the frame reader task.
pub struct Acquisition;

impl Acquisition {
    /// Start reading frames from `source` on a tokio task.
    pub fn spawn<S>(source: S, options: AcquisitionOptions) -> AcquisitionHandle
    where
        S: FrameSource,
    {
        let (frame_tx, frame_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let nominal_fps = options.nominal_fps;

        let task = tokio::spawn(Self::frame_reader_task(source, frame_tx, cancel.clone(), options));

        AcquisitionHandle {
            frames: frame_rx,
            task,
            nominal_fps,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    async fn frame_reader_task<S>(
        mut source: S,
        frame_tx: watch::Sender<Option<Arc<Frame>>>,
        cancel: CancellationToken,
        options: AcquisitionOptions,
    ) -> FailureLog
    where
        S: FrameSource,
    {
        info!("Acquisition task started");
        let mut failures = FailureLog::new();
        let mut frame_count = 0u64;
        let mut consecutive_errors = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Acquisition cancelled");
                    break;
                }
                result = source.next_frame(options.frame_timeout) => result,
            };

            match result {
                Ok(frame) => {
                    frame_count += 1;
                    consecutive_errors = 0;
                    trace!(sequence = frame.sequence, timestamp_ms = frame.timestamp_ms, "Frame");

                    if frame_tx.send(Some(Arc::new(frame))).is_err() {
                        debug!("All frame receivers dropped, stopping");
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!("Frame source lost: {}", e);
                    failures.record_error(CONTEXT, &e);
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    failures.record_error(CONTEXT, &e);
                    warn!(
                        "Acquisition error ({}/{}): {}",
                        consecutive_errors, options.max_consecutive_errors, e
                    );
                    if consecutive_errors >= options.max_consecutive_errors {
                        error!("Too many consecutive acquisition errors, giving up");
                        break;
                    }
                }
            }
        }

        let dropped = source.dropped_frames();
        info!(frames = frame_count, dropped, "Acquisition task ended");
        failures
    }
}

/// Handle to a running acquisition. Dropping it cancels the task.
pub struct AcquisitionHandle {
    frames: watch::Receiver<Option<Arc<Frame>>>,
    cancel: CancellationToken,
    task: JoinHandle<FailureLog>,
    nominal_fps: f64,
    _guard: DropGuard,
}

impl AcquisitionHandle {
    /// Stream of frames at the requested rate.
    ///
    /// Starts with the most recent frame, if any. Ends when the driver stops.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<Frame>> + Send + Unpin + 'static {
        let frames = WatchStream::new(self.frames.clone()).filter_map(|frame| async move { frame });

        match rate.throttle_interval(self.nominal_fps) {
            None => frames.boxed(),
            Some(period) => frames.throttle(period).boxed(),
        }
    }

    /// Most recent frame, if any arrived yet.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Token cancelling the driver, for wiring into a wider shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the driver and collect its failure log.
    pub async fn stop(self) -> FailureLog {
        self.cancel.cancel();
        match self.task.await {
            Ok(failures) => failures,
            Err(e) => {
                error!("Acquisition task failed: {}", e);
                let mut failures = FailureLog::new();
                failures.record(FailureKind::Connectivity, "acquisition task aborted");
                failures
            }
        }
    }
}
