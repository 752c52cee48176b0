//! Decoded frame types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::CameraParameters;

/// Device families with their own blob layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceFamily {
    /// Stereo camera with color sensor (Visionary-S)
    VisionaryS,
    /// Time-of-flight camera (Visionary-T Mini)
    VisionaryTMini,
}

/// Named map channels a frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Z or radial distance, see [`Frame::depth_unit_mm`]
    Depth,
    Intensity,
    /// Per-pixel state or confidence flags
    State,
    /// RGBA color
    Color,
}

impl Channel {
    pub const fn name(self) -> &'static str {
        match self {
            Channel::Depth => "depth",
            Channel::Intensity => "intensity",
            Channel::State => "state",
            Channel::Color => "color",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed sample array of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMap {
    U16(Vec<u16>),
    Rgba(Vec<u32>),
}

impl SampleMap {
    pub fn len(&self) -> usize {
        match self {
            SampleMap::U16(samples) => samples.len(),
            SampleMap::Rgba(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            SampleMap::U16(samples) => Some(samples),
            SampleMap::Rgba(_) => None,
        }
    }

    pub fn as_rgba(&self) -> Option<&[u32]> {
        match self {
            SampleMap::Rgba(samples) => Some(samples),
            SampleMap::U16(_) => None,
        }
    }
}

/// One decoded acquisition instant.
///
/// Owned by the caller. The acquisition driver shares frames as `Arc<Frame>`;
/// consumers clone what they keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Device frame counter
    pub sequence: u32,
    /// Device clock in milliseconds
    pub timestamp_ms: u64,
    pub family: DeviceFamily,
    pub camera: CameraParameters,
    /// Millimetres per depth LSB
    pub depth_unit_mm: f32,
    pub maps: BTreeMap<Channel, SampleMap>,
}

impl Frame {
    pub fn map(&self, channel: Channel) -> Option<&SampleMap> {
        self.maps.get(&channel)
    }

    pub fn depth_map(&self) -> Option<&[u16]> {
        self.map(Channel::Depth).and_then(SampleMap::as_u16)
    }

    pub fn intensity_map(&self) -> Option<&[u16]> {
        self.map(Channel::Intensity).and_then(SampleMap::as_u16)
    }

    pub fn state_map(&self) -> Option<&[u16]> {
        self.map(Channel::State).and_then(SampleMap::as_u16)
    }

    pub fn color_map(&self) -> Option<&[u32]> {
        self.map(Channel::Color).and_then(SampleMap::as_rgba)
    }

    /// Depth of one pixel in millimetres.
    pub fn depth_mm(&self, x: u16, y: u16) -> Option<f32> {
        if x >= self.camera.width || y >= self.camera.height {
            return None;
        }
        let index = y as usize * self.camera.width as usize + x as usize;
        self.depth_map()
            .and_then(|depth| depth.get(index))
            .map(|raw| *raw as f32 * self.depth_unit_mm)
    }
}
