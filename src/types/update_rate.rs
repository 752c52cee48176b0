//! Delivery rate control for frame subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which a subscriber wants frames delivered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every frame the device sends
    Native,

    /// At most this many frames per second, latest frame wins.
    /// A cap at or above the device frame rate behaves like Native.
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the nominal device frame rate
    pub fn normalize(self, device_fps: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(fps) if fps as f64 >= device_fps => UpdateRate::Native,
            UpdateRate::Max(fps) => UpdateRate::Max(fps),
        }
    }

    /// Throttle interval, if the rate requires throttling
    pub fn throttle_interval(self, device_fps: f64) -> Option<Duration> {
        match self.normalize(device_fps) {
            UpdateRate::Native => None,
            UpdateRate::Max(fps) => Some(Duration::from_secs_f64(1.0 / fps as f64)),
        }
    }
}
