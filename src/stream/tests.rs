//! Frame channel tests over a loopback data port

use super::*;
use crate::VisionaryError;
use crate::decoder::Decoder;
use crate::test_utils::{BlobFeeder, sample_blob, sample_camera, sample_depth};
use crate::types::{Channel, DeviceFamily, SampleMap};
use std::time::Duration;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

async fn open_pair(family: DeviceFamily) -> (BlobFeeder, FrameChannel) {
    let mut feeder = BlobFeeder::bind().await.unwrap();
    let port = feeder.port().unwrap();
    let channel = FrameChannel::open("127.0.0.1", port, Decoder::for_family(family), StreamOptions::default())
        .await
        .unwrap();
    feeder.accept().await.unwrap();
    (feeder, channel)
}

#[tokio::test]
async fn frame_arrives_intact() {
    let _ = tracing_subscriber::fmt::try_init();
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;

    feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, 1, 4, 3)).await.unwrap();
    let frame = channel.next_frame(FRAME_TIMEOUT).await.unwrap();

    assert_eq!(frame.sequence, 1);
    assert_eq!(frame.timestamp_ms, 33);
    assert_eq!(frame.camera, sample_camera(4, 3));
    assert_eq!(frame.depth_map(), Some(&sample_depth(12)[..]));
    assert_eq!(frame.intensity_map().map(<[u16]>::len), Some(12));
    assert!(frame.color_map().is_none());
    assert_eq!(channel.last_sequence(), Some(1));
    assert_eq!(channel.dropped_frames(), 0);
}

#[tokio::test]
async fn stereo_frames_carry_color() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryS).await;
    feeder.send(&sample_blob(DeviceFamily::VisionaryS, 9, 2, 2)).await.unwrap();

    let frame = channel.next_frame(FRAME_TIMEOUT).await.unwrap();
    assert_eq!(frame.family, DeviceFamily::VisionaryS);
    assert_eq!(frame.map(Channel::Color), Some(&SampleMap::Rgba(vec![0xFF80_4020; 4])));
    assert!((frame.depth_unit_mm - 0.1).abs() < f32::EPSILON);
}

#[tokio::test]
async fn blob_split_across_writes_is_reassembled() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;
    let blob = sample_blob(DeviceFamily::VisionaryTMini, 3, 8, 8);

    let (head, tail) = blob.split_at(blob.len() / 3);
    feeder.send(head).await.unwrap();
    let err = channel.next_frame(Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, VisionaryError::Timeout { .. }));

    feeder.send(tail).await.unwrap();
    let frame = channel.next_frame(FRAME_TIMEOUT).await.unwrap();
    assert_eq!(frame.sequence, 3);
}

#[tokio::test]
async fn timeout_then_later_frame_is_delivered() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;

    let err = channel.next_frame(Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, VisionaryError::Timeout { .. }));
    assert!(channel.is_open());

    feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, 1, 2, 2)).await.unwrap();
    assert_eq!(channel.next_frame(FRAME_TIMEOUT).await.unwrap().sequence, 1);
}

#[tokio::test]
async fn sequence_gaps_count_as_dropped() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;
    for sequence in [1, 2, 4, 5] {
        feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, sequence, 2, 2)).await.unwrap();
    }

    for expected in [1, 2, 4, 5] {
        assert_eq!(channel.next_frame(FRAME_TIMEOUT).await.unwrap().sequence, expected);
    }
    assert_eq!(channel.dropped_frames(), 1);
}

#[tokio::test]
async fn sequence_regression_is_a_protocol_violation() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;
    for sequence in [1, 3, 2] {
        feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, sequence, 2, 2)).await.unwrap();
    }

    assert_eq!(channel.next_frame(FRAME_TIMEOUT).await.unwrap().sequence, 1);
    assert_eq!(channel.next_frame(FRAME_TIMEOUT).await.unwrap().sequence, 3);
    let err = channel.next_frame(FRAME_TIMEOUT).await.unwrap_err();
    assert!(matches!(err, VisionaryError::Protocol { .. }));
    assert_eq!(channel.last_sequence(), Some(3));
    assert!(channel.is_open());
}

#[tokio::test]
async fn corrupt_blob_is_skipped() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;
    let mut corrupt = sample_blob(DeviceFamily::VisionaryTMini, 1, 2, 2).to_vec();
    let middle = corrupt.len() / 2;
    corrupt[middle] ^= 0xFF;

    feeder.send(&corrupt).await.unwrap();
    feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, 2, 2, 2)).await.unwrap();

    let err = channel.next_frame(FRAME_TIMEOUT).await.unwrap_err();
    assert!(err.is_protocol_violation());
    assert_eq!(channel.next_frame(FRAME_TIMEOUT).await.unwrap().sequence, 2);
}

#[tokio::test]
async fn end_of_stream_is_a_connection_error() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryTMini).await;
    feeder.hang_up().await;

    let err = channel.next_frame(FRAME_TIMEOUT).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(!channel.is_open());

    let err = channel.next_frame(FRAME_TIMEOUT).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn missing_segment_fails_decoding() {
    let (mut feeder, mut channel) = open_pair(DeviceFamily::VisionaryS).await;
    // a time-of-flight blob lacks the color map
    feeder.send(&sample_blob(DeviceFamily::VisionaryTMini, 1, 2, 2)).await.unwrap();

    let err = channel.next_frame(FRAME_TIMEOUT).await.unwrap_err();
    assert!(matches!(err, VisionaryError::Protocol { .. }));
}
