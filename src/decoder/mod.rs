//! Device-specific interpretation of raw blobs.
//!
//! The set of device families is closed, so decoders form a tagged union:
//! [`Decoder::Stereo`] for Visionary-S and [`Decoder::TimeOfFlight`] for
//! Visionary-T Mini. Both implement [`FrameDecoder`].

mod stereo;
mod tof;

pub use stereo::StereoDecoder;
pub use tof::TofDecoder;

use std::collections::BTreeMap;

use crate::stream::{RawBlob, Segment, SegmentType, decode_calibration};
use crate::types::{CameraParameters, Channel, DeviceFamily, Frame, SampleMap};
use crate::{Result, VisionaryError};

/// Turns a verified [`RawBlob`] into a typed [`Frame`].
pub trait FrameDecoder {
    fn family(&self) -> DeviceFamily;

    fn decode(&self, blob: &RawBlob) -> Result<Frame>;
}

/// Decoder for one of the supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Stereo(StereoDecoder),
    TimeOfFlight(TofDecoder),
}

impl Decoder {
    pub fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::VisionaryS => Decoder::Stereo(StereoDecoder),
            DeviceFamily::VisionaryTMini => Decoder::TimeOfFlight(TofDecoder),
        }
    }
}

impl From<DeviceFamily> for Decoder {
    fn from(family: DeviceFamily) -> Self {
        Decoder::for_family(family)
    }
}

impl FrameDecoder for Decoder {
    fn family(&self) -> DeviceFamily {
        match self {
            Decoder::Stereo(decoder) => decoder.family(),
            Decoder::TimeOfFlight(decoder) => decoder.family(),
        }
    }

    fn decode(&self, blob: &RawBlob) -> Result<Frame> {
        match self {
            Decoder::Stereo(decoder) => decoder.decode(blob),
            Decoder::TimeOfFlight(decoder) => decoder.decode(blob),
        }
    }
}

/// Maps a family requires, with the segment each is read from.
struct Layout {
    family: DeviceFamily,
    depth_unit_mm: f32,
    maps: &'static [(Channel, SegmentType)],
}

fn decode_with(layout: &Layout, blob: &RawBlob) -> Result<Frame> {
    let camera = decode_calibration(&required(blob, SegmentType::Calibration, layout.family)?.data)?;

    let mut maps = BTreeMap::new();
    for (channel, kind) in layout.maps {
        let segment = required(blob, *kind, layout.family)?;
        maps.insert(*channel, sample_map(*channel, segment, &camera)?);
    }

    Ok(Frame {
        sequence: blob.sequence,
        timestamp_ms: blob.timestamp_ms,
        family: layout.family,
        camera,
        depth_unit_mm: layout.depth_unit_mm,
        maps,
    })
}

fn required(blob: &RawBlob, kind: SegmentType, family: DeviceFamily) -> Result<&Segment> {
    blob.segment(kind).ok_or_else(|| {
        VisionaryError::protocol(
            format!("{:?} blob {}", family, blob.sequence),
            format!("missing {:?} segment", kind),
        )
    })
}

fn sample_map(channel: Channel, segment: &Segment, camera: &CameraParameters) -> Result<SampleMap> {
    let sample_size = if channel == Channel::Color { 4 } else { 2 };
    let data = &segment.data;
    if data.len() % sample_size != 0 {
        return Err(VisionaryError::protocol(
            format!("{} map", channel),
            format!("{} bytes is not a multiple of {}", data.len(), sample_size),
        ));
    }
    let samples = data.len() / sample_size;
    if samples != camera.pixel_count() {
        return Err(VisionaryError::protocol(
            format!("{} map", channel),
            format!(
                "{} samples for a {}x{} image",
                samples, camera.width, camera.height
            ),
        ));
    }

    Ok(if sample_size == 4 {
        SampleMap::Rgba(
            data.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect(),
        )
    } else {
        SampleMap::U16(data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
    })
}

impl DeviceFamily {
    /// Decoder for this family.
    pub fn decoder(self) -> Decoder {
        Decoder::for_family(self)
    }
}
