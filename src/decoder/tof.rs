//! Visionary-T Mini time-of-flight frames

use super::{FrameDecoder, Layout, decode_with};
use crate::stream::{RawBlob, SegmentType};
use crate::types::{Channel, DeviceFamily, Frame};
use crate::Result;

/// Distance resolution of the time-of-flight camera.
pub const TOF_DEPTH_UNIT_MM: f32 = 0.25;

const LAYOUT: Layout = Layout {
    family: DeviceFamily::VisionaryTMini,
    depth_unit_mm: TOF_DEPTH_UNIT_MM,
    maps: &[
        (Channel::Depth, SegmentType::Depth),
        (Channel::Intensity, SegmentType::Intensity),
        (Channel::State, SegmentType::State),
    ],
};

/// Decodes radial distance, intensity and state maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TofDecoder;

impl FrameDecoder for TofDecoder {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::VisionaryTMini
    }

    fn decode(&self, blob: &RawBlob) -> Result<Frame> {
        decode_with(&LAYOUT, blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{BlobAssembler, BlobWriter};
    use crate::types::CameraParameters;

    #[test]
    fn decodes_distance_intensity_and_state() {
        let camera = CameraParameters { width: 2, height: 2, ..Default::default() };
        let wire = BlobWriter::new(77)
            .calibration(&camera)
            .depth(&[4000, 4001, 4002, 4003])
            .intensity(&[100, 200, 300, 400])
            .state(&[0, 0, 1, 0])
            .segment(SegmentType::Other(42), vec![0xEE; 3])
            .encode();
        let mut assembler = BlobAssembler::default();
        assembler.extend(&wire);
        let blob = assembler.try_extract().unwrap().unwrap();

        let frame = TofDecoder.decode(&blob).unwrap();
        assert_eq!(frame.family, DeviceFamily::VisionaryTMini);
        assert_eq!(frame.maps.len(), 3);
        assert_eq!(frame.intensity_map(), Some(&[100, 200, 300, 400][..]));
        assert_eq!(frame.depth_mm(0, 0), Some(1000.0));
        assert!(frame.color_map().is_none());
    }
}
