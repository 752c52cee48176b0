//! Streaming blob format
//!
//! ```text
//! 02 02 02 02 | u32 body length | body | u32 CRC-32 of body
//!
//! body: u16 version (1) | u8 packet type ('b') | u16 blob id | u32 sequence
//!       | u64 timestamp ms | u16 segment count N
//!       | N x (u8 segment type, u32 segment length) | segment payloads
//! ```
//!
//! Framing fields are big-endian. Sample data inside segments is little-endian,
//! as the device produces it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{CRC_32_ISO_HDLC, Crc};

use crate::types::CameraParameters;
use crate::{Result, VisionaryError};

pub const BLOB_MAGIC: [u8; 4] = [0x02; 4];
pub const BLOB_VERSION: u16 = 1;
pub const PACKET_TYPE: u8 = b'b';

/// Default upper bound for a blob body.
pub const DEFAULT_MAX_BLOB_SIZE: usize = 32 * 1024 * 1024;

/// Encoded size of a calibration segment.
pub const CALIBRATION_SIZE: usize = 2 + 2 + 10 * 8 + 16 * 8;

pub(crate) const PREFIX_SIZE: usize = 8;
pub(crate) const TRAILER_SIZE: usize = 4;
pub(crate) const BODY_HEADER_SIZE: usize = 2 + 1 + 2 + 4 + 8 + 2;
const SEGMENT_ENTRY_SIZE: usize = 5;

pub(crate) const BLOB_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Content of one blob segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Calibration,
    /// u16 samples
    Depth,
    /// u16 samples
    Intensity,
    /// u16 state or confidence samples
    State,
    /// u32 RGBA samples
    Color,
    /// Not interpreted by any decoder
    Other(u8),
}

impl SegmentType {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => SegmentType::Calibration,
            1 => SegmentType::Depth,
            2 => SegmentType::Intensity,
            3 => SegmentType::State,
            4 => SegmentType::Color,
            other => SegmentType::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            SegmentType::Calibration => 0,
            SegmentType::Depth => 1,
            SegmentType::Intensity => 2,
            SegmentType::State => 3,
            SegmentType::Color => 4,
            SegmentType::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentType,
    pub data: Bytes,
}

/// A complete, checksum-verified blob before device-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlob {
    pub blob_id: u16,
    pub sequence: u32,
    pub timestamp_ms: u64,
    pub segments: Vec<Segment>,
}

impl RawBlob {
    /// First segment of the given type.
    pub fn segment(&self, kind: SegmentType) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.kind == kind)
    }

    /// Parse a body whose CRC has already been checked.
    pub(crate) fn parse_body(mut body: Bytes) -> Result<Self> {
        let body_len = body.len();
        if body_len < BODY_HEADER_SIZE {
            return Err(VisionaryError::protocol(
                "blob header",
                format!("body of {} bytes shorter than header", body_len),
            ));
        }

        let version = body.get_u16();
        if version != BLOB_VERSION {
            return Err(VisionaryError::protocol(
                "blob header",
                format!("unsupported version {}", version),
            ));
        }
        let packet = body.get_u8();
        if packet != PACKET_TYPE {
            return Err(VisionaryError::protocol(
                "blob header",
                format!("unexpected packet type {:#04x}", packet),
            ));
        }
        let blob_id = body.get_u16();
        let sequence = body.get_u32();
        let timestamp_ms = body.get_u64();
        let count = body.get_u16() as usize;

        let table_size = count * SEGMENT_ENTRY_SIZE;
        if body.remaining() < table_size {
            return Err(VisionaryError::protocol(
                "blob segment table",
                format!("{} segments do not fit in {} bytes", count, body_len),
            ));
        }
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = SegmentType::from_code(body.get_u8());
            let len = body.get_u32() as usize;
            table.push((kind, len));
        }

        let declared: usize = table.iter().map(|(_, len)| *len).sum();
        if declared != body.remaining() {
            return Err(VisionaryError::protocol(
                "blob segment table",
                format!(
                    "segments declare {} bytes, body carries {}",
                    declared,
                    body.remaining()
                ),
            ));
        }

        let segments =
            table.into_iter().map(|(kind, len)| Segment { kind, data: body.split_to(len) }).collect();

        Ok(Self { blob_id, sequence, timestamp_ms, segments })
    }
}

/// Append a calibration segment payload.
pub fn encode_calibration(camera: &CameraParameters, buf: &mut BytesMut) {
    buf.put_u16_le(camera.width);
    buf.put_u16_le(camera.height);
    for value in [
        camera.fx, camera.fy, camera.cx, camera.cy, camera.k1, camera.k2, camera.p1, camera.p2,
        camera.k3, camera.f2rc,
    ] {
        buf.put_f64_le(value);
    }
    for value in camera.camera_to_world {
        buf.put_f64_le(value);
    }
}

pub fn decode_calibration(mut data: &[u8]) -> Result<CameraParameters> {
    if data.len() != CALIBRATION_SIZE {
        return Err(VisionaryError::protocol(
            "calibration segment",
            format!("{} bytes, expected {}", data.len(), CALIBRATION_SIZE),
        ));
    }
    let width = data.get_u16_le();
    let height = data.get_u16_le();
    let fx = data.get_f64_le();
    let fy = data.get_f64_le();
    let cx = data.get_f64_le();
    let cy = data.get_f64_le();
    let k1 = data.get_f64_le();
    let k2 = data.get_f64_le();
    let p1 = data.get_f64_le();
    let p2 = data.get_f64_le();
    let k3 = data.get_f64_le();
    let f2rc = data.get_f64_le();
    let mut camera_to_world = [0.0; 16];
    for value in &mut camera_to_world {
        *value = data.get_f64_le();
    }
    Ok(CameraParameters { width, height, fx, fy, cx, cy, k1, k2, k3, p1, p2, f2rc, camera_to_world })
}

/// Encoder for the streaming blob format, the device side of the data channel.
#[derive(Debug, Clone)]
pub struct BlobWriter {
    blob_id: u16,
    sequence: u32,
    timestamp_ms: u64,
    segments: Vec<(u8, Bytes)>,
}

impl BlobWriter {
    pub fn new(sequence: u32) -> Self {
        Self { blob_id: 0, sequence, timestamp_ms: 0, segments: Vec::new() }
    }

    pub fn blob_id(mut self, blob_id: u16) -> Self {
        self.blob_id = blob_id;
        self
    }

    pub fn timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn calibration(self, camera: &CameraParameters) -> Self {
        let mut buf = BytesMut::with_capacity(CALIBRATION_SIZE);
        encode_calibration(camera, &mut buf);
        self.segment(SegmentType::Calibration, buf.freeze())
    }

    pub fn depth(self, samples: &[u16]) -> Self {
        self.segment(SegmentType::Depth, u16_samples(samples))
    }

    pub fn intensity(self, samples: &[u16]) -> Self {
        self.segment(SegmentType::Intensity, u16_samples(samples))
    }

    pub fn state(self, samples: &[u16]) -> Self {
        self.segment(SegmentType::State, u16_samples(samples))
    }

    pub fn color(self, samples: &[u32]) -> Self {
        let mut buf = BytesMut::with_capacity(samples.len() * 4);
        for sample in samples {
            buf.put_u32_le(*sample);
        }
        self.segment(SegmentType::Color, buf.freeze())
    }

    /// Append an arbitrary segment.
    pub fn segment(mut self, kind: SegmentType, data: impl Into<Bytes>) -> Self {
        self.segments.push((kind.code(), data.into()));
        self
    }

    /// Encode the complete blob, magic through CRC trailer.
    pub fn encode(&self) -> Bytes {
        let payload: usize = self.segments.iter().map(|(_, data)| data.len()).sum();
        let body_len = BODY_HEADER_SIZE + self.segments.len() * SEGMENT_ENTRY_SIZE + payload;

        let mut buf = BytesMut::with_capacity(PREFIX_SIZE + body_len + TRAILER_SIZE);
        buf.put_slice(&BLOB_MAGIC);
        buf.put_u32(body_len as u32);

        let body_start = buf.len();
        buf.put_u16(BLOB_VERSION);
        buf.put_u8(PACKET_TYPE);
        buf.put_u16(self.blob_id);
        buf.put_u32(self.sequence);
        buf.put_u64(self.timestamp_ms);
        buf.put_u16(self.segments.len() as u16);
        for (code, data) in &self.segments {
            buf.put_u8(*code);
            buf.put_u32(data.len() as u32);
        }
        for (_, data) in &self.segments {
            buf.put_slice(data);
        }

        let crc = BLOB_CRC.checksum(&buf[body_start..]);
        buf.put_u32(crc);
        buf.freeze()
    }
}

fn u16_samples(samples: &[u16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for sample in samples {
        buf.put_u16_le(*sample);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(wire: &Bytes) -> Bytes {
        wire.slice(PREFIX_SIZE..wire.len() - TRAILER_SIZE)
    }

    #[test]
    fn writer_layout() {
        let wire = BlobWriter::new(7).blob_id(3).timestamp_ms(99).depth(&[0x0102]).encode();

        assert_eq!(&wire[..4], &BLOB_MAGIC);
        let body_len = u32::from_be_bytes([wire[4], wire[5], wire[6], wire[7]]) as usize;
        assert_eq!(body_len, BODY_HEADER_SIZE + SEGMENT_ENTRY_SIZE + 2);
        assert_eq!(wire.len(), PREFIX_SIZE + body_len + TRAILER_SIZE);

        // first segment payload, little-endian sample
        assert_eq!(&wire[wire.len() - TRAILER_SIZE - 2..wire.len() - TRAILER_SIZE], &[0x02, 0x01]);

        let trailer = &wire[wire.len() - 4..];
        let crc = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        assert_eq!(crc, BLOB_CRC.checksum(&body_of(&wire)));
    }

    #[test]
    fn parse_body_recovers_segments() {
        let wire = BlobWriter::new(42)
            .timestamp_ms(1_700_000_000_000)
            .depth(&[1, 2])
            .segment(SegmentType::Other(9), vec![0xAA])
            .encode();

        let blob = RawBlob::parse_body(body_of(&wire)).unwrap();
        assert_eq!(blob.sequence, 42);
        assert_eq!(blob.timestamp_ms, 1_700_000_000_000);
        assert_eq!(blob.segments.len(), 2);
        assert_eq!(&blob.segment(SegmentType::Depth).unwrap().data[..], &[1, 0, 2, 0]);
        assert_eq!(blob.segment(SegmentType::Other(9)).unwrap().data.len(), 1);
        assert!(blob.segment(SegmentType::Color).is_none());
    }

    #[test]
    fn table_must_account_for_every_byte() {
        let wire = BlobWriter::new(1).depth(&[1, 2]).encode();
        let mut body = body_of(&wire).to_vec();
        body.push(0);
        let err = RawBlob::parse_body(Bytes::from(body)).unwrap_err();
        assert!(err.is_protocol_violation());

        let body = body_of(&wire);
        let err = RawBlob::parse_body(body.slice(..body.len() - 1)).unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let wire = BlobWriter::new(1).encode();
        let mut body = body_of(&wire).to_vec();
        body[1] = 2;
        assert!(RawBlob::parse_body(Bytes::from(body)).is_err());
    }

    #[test]
    fn calibration_roundtrip() {
        let camera = CameraParameters {
            width: 512,
            height: 424,
            fx: 366.2,
            fy: 366.1,
            cx: 256.5,
            cy: 212.5,
            k1: -0.09,
            k2: 0.02,
            k3: 0.0,
            p1: 0.001,
            p2: -0.002,
            f2rc: 0.0,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        encode_calibration(&camera, &mut buf);
        assert_eq!(buf.len(), CALIBRATION_SIZE);
        assert_eq!(&buf[..4], &[0x00, 0x02, 0xA8, 0x01]);
        assert_eq!(decode_calibration(&buf).unwrap(), camera);
        assert!(decode_calibration(&buf[..CALIBRATION_SIZE - 1]).is_err());
    }

    #[test]
    fn segment_codes() {
        for code in 0..=255u8 {
            assert_eq!(SegmentType::from_code(code).code(), code);
        }
        assert_eq!(SegmentType::from_code(4), SegmentType::Color);
    }
}
