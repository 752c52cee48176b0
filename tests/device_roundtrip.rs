//! End-to-end tests through the public API against hand-rolled device ends.

use bytes::{BufMut, BytesMut};
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use visionary::cola::ProtocolVariant;
use visionary::cola::framing::{Cola2Header, ControlFrameBuffer, encode_frame};
use visionary::stream::BlobWriter;
use visionary::types::CameraParameters;
use visionary::{DeviceConfig, DeviceFamily, FailureKind, UpdateRate, Visionary, VisionaryError};

fn tof_blob(sequence: u32) -> bytes::Bytes {
    let camera = CameraParameters { width: 3, height: 2, fx: 100.0, fy: 100.0, ..Default::default() };
    BlobWriter::new(sequence)
        .timestamp_ms(1_000 + u64::from(sequence))
        .calibration(&camera)
        .depth(&[4000, 4004, 4008, 4012, 4016, 4020])
        .intensity(&[1; 6])
        .state(&[0; 6])
        .encode()
}

fn config_for(port: u16) -> DeviceConfig {
    DeviceConfig {
        host: "127.0.0.1".into(),
        control_port: Some(port),
        data_port: port,
        protocol: ProtocolVariant::ColaB,
        family: DeviceFamily::VisionaryTMini,
        frame_timeout_ms: 500,
        command_timeout_ms: 500,
        ..Default::default()
    }
}

#[tokio::test]
async fn acquisition_delivers_frames_until_device_hangs_up() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = config_for(listener.local_addr()?.port());

    let acquisition = Visionary::acquire(&config).await?;
    let mut frames = acquisition.subscribe(UpdateRate::Native);
    let (mut device, _) = listener.accept().await?;

    for sequence in 1..=3 {
        device.write_all(&tof_blob(sequence)).await?;
    }

    let mut last = None;
    while let Some(frame) = tokio::time::timeout(Duration::from_secs(2), frames.next()).await? {
        assert_eq!(frame.family, DeviceFamily::VisionaryTMini);
        last = Some(frame.sequence);
        if frame.sequence == 3 {
            assert_eq!(frame.depth_mm(2, 1), Some(1005.0));
            break;
        }
    }
    assert_eq!(last, Some(3));

    drop(device);
    while tokio::time::timeout(Duration::from_secs(2), frames.next()).await?.is_some() {}

    let failures = acquisition.stop().await;
    assert_eq!(failures.most_severe(), Some(FailureKind::Connectivity));
    Ok(())
}

#[tokio::test]
async fn control_exchange_over_cola_b() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = config_for(listener.local_addr()?.port());

    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let mut buffer = ControlFrameBuffer::new(ProtocolVariant::ColaB, 4096);
        let request = loop {
            if let Some(frame) = buffer.try_extract()? {
                break frame;
            }
            if socket.read_buf(buffer.buffer_mut()).await? == 0 {
                anyhow::bail!("client went away");
            }
        };
        assert_eq!(&request.body[..], b"sRN DeviceIdent");

        let mut body = BytesMut::new();
        body.put_slice(b"sRA DeviceIdent ");
        for text in ["Visionary-S CX", "1.4.2"] {
            body.put_u16(text.len() as u16);
            body.put_slice(text.as_bytes());
        }
        socket
            .write_all(&encode_frame(ProtocolVariant::ColaB, Cola2Header::default(), &body))
            .await?;
        anyhow::Ok(())
    });

    let mut session = Visionary::connect(&config).await?;
    let ident = session.device_ident().await?;
    assert_eq!(ident.to_string(), "Visionary-S CX 1.4.2");
    session.close().await;

    device.await??;
    Ok(())
}

#[tokio::test]
async fn unreachable_device_fails_to_connect() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = config_for(listener.local_addr()?.port());
    drop(listener);

    let err = Visionary::connect(&config).await.err().expect("connect must fail");
    assert!(matches!(err, VisionaryError::Connection { .. }));
    assert!(Visionary::open_stream(&config).await.is_err());
    Ok(())
}

#[tokio::test]
async fn invalid_config_is_rejected_before_connecting() {
    let config = DeviceConfig { host: String::new(), ..Default::default() };
    assert!(matches!(Visionary::connect(&config).await, Err(VisionaryError::Config { .. })));
}
