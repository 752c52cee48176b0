//! Visionary-S stereo frames

use super::{FrameDecoder, Layout, decode_with};
use crate::stream::{RawBlob, SegmentType};
use crate::types::{Channel, DeviceFamily, Frame};
use crate::Result;

/// Depth resolution of the stereo camera.
pub const STEREO_DEPTH_UNIT_MM: f32 = 0.1;

const LAYOUT: Layout = Layout {
    family: DeviceFamily::VisionaryS,
    depth_unit_mm: STEREO_DEPTH_UNIT_MM,
    maps: &[
        (Channel::Depth, SegmentType::Depth),
        (Channel::State, SegmentType::State),
        (Channel::Color, SegmentType::Color),
    ],
};

/// Decodes Z depth, confidence state and RGBA color maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoDecoder;

impl FrameDecoder for StereoDecoder {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::VisionaryS
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
    fn decodes_all_stereo_maps() {
        let camera = CameraParameters { width: 2, height: 1, fx: 500.0, ..Default::default() };
        let wire = BlobWriter::new(5)
            .timestamp_ms(1234)
            .calibration(&camera)
            .depth(&[10_000, 20_000])
            .state(&[0, 1])
            .color(&[0xFF00_00FF, 0x00FF_00FF])
            .encode();
        let mut assembler = BlobAssembler::default();
        assembler.extend(&wire);
        let blob = assembler.try_extract().unwrap().unwrap();

        let frame = StereoDecoder.decode(&blob).unwrap();
        assert_eq!(frame.sequence, 5);
        assert_eq!(frame.timestamp_ms, 1234);
        assert_eq!(frame.camera, camera);
        assert_eq!(frame.depth_map(), Some(&[10_000, 20_000][..]));
        assert_eq!(frame.state_map(), Some(&[0, 1][..]));
        assert_eq!(frame.color_map(), Some(&[0xFF00_00FF, 0x00FF_00FF][..]));
        assert!(frame.intensity_map().is_none());
        assert_eq!(frame.depth_mm(1, 0), Some(2000.0));
    }

    #[test]
    fn color_is_required() {
        let camera = CameraParameters { width: 1, height: 1, ..Default::default() };
        let wire = BlobWriter::new(1).calibration(&camera).depth(&[1]).state(&[1]).encode();
        let mut assembler = BlobAssembler::default();
        assembler.extend(&wire);
        let blob = assembler.try_extract().unwrap().unwrap();
        assert!(StereoDecoder.decode(&blob).unwrap_err().is_protocol_violation());
    }
}
