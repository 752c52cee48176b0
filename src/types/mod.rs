//! Core value types shared by the control and streaming sides.
//!
//! - [`ParamType`] and [`Value`] describe CoLa scalar parameters
//! - [`UserLevel`] is the privilege ordering of control sessions
//! - [`Frame`], [`Channel`] and [`SampleMap`] hold decoded sensor output
//! - [`CameraParameters`] is the calibration carried with every frame
//! - [`UpdateRate`] controls subscription delivery rate
//!
//! ## Usage Example
//!
//! ```rust
//! use visionary::types::{Channel, DeviceFamily, Frame, SampleMap, CameraParameters};
//! use std::collections::BTreeMap;
//!
//! let mut maps = BTreeMap::new();
//! maps.insert(Channel::Depth, SampleMap::U16(vec![4000, 4004]));
//!
//! let frame = Frame {
//!     sequence: 1,
//!     timestamp_ms: 1_000,
//!     family: DeviceFamily::VisionaryTMini,
//!     camera: CameraParameters { width: 2, height: 1, ..Default::default() },
//!     depth_unit_mm: 0.25,
//!     maps,
//! };
//!
//! assert_eq!(frame.depth_mm(1, 0), Some(1001.0));
//! ```

mod camera;
mod frame;
mod param_type;
mod update_rate;
mod user_level;

pub use camera::CameraParameters;
pub use frame::{Channel, DeviceFamily, Frame, SampleMap};
pub use param_type::{ParamType, Value};
pub use update_rate::UpdateRate;
pub use user_level::UserLevel;
