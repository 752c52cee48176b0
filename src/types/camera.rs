//! Camera calibration metadata carried in every frame

use serde::{Deserialize, Serialize};

/// Intrinsic and extrinsic calibration of the sensor, as delivered by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    /// Image width in pixels
    pub width: u16,
    /// Image height in pixels
    pub height: u16,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Radial distortion coefficients
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    /// Tangential distortion coefficients
    pub p1: f64,
    pub p2: f64,
    /// Distance from the focal point to the ray cross, in mm
    pub f2rc: f64,
    /// Camera-to-world transform, row-major 4x4
    pub camera_to_world: [f64; 16],
}

impl CameraParameters {
    /// Number of pixels per map.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for CameraParameters {
    fn default() -> Self {
        let mut identity = [0.0; 16];
        identity[0] = 1.0;
        identity[5] = 1.0;
        identity[10] = 1.0;
        identity[15] = 1.0;
        Self {
            width: 0,
            height: 0,
            fx: 0.0,
            fy: 0.0,
            cx: 0.0,
            cy: 0.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
            f2rc: 0.0,
            camera_to_world: identity,
        }
    }
}
