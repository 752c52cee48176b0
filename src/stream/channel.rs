//! Data channel connection delivering decoded frames

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace};

use super::assembler::BlobAssembler;
use super::blob::DEFAULT_MAX_BLOB_SIZE;
use crate::decoder::{Decoder, FrameDecoder};
use crate::types::Frame;
use crate::{Result, VisionaryError};

/// Tunables for a [`FrameChannel`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub connect_timeout: Duration,
    /// Largest blob body accepted
    pub max_blob_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_millis(5000), max_blob_size: DEFAULT_MAX_BLOB_SIZE }
    }
}

/// Receiving end of the device data port.
///
/// Frames must arrive with strictly increasing sequence numbers. Gaps are
/// allowed and counted in [`dropped_frames`](Self::dropped_frames); a repeated
/// or older sequence is a protocol violation.
#[derive(Debug)]
pub struct FrameChannel {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    assembler: BlobAssembler,
    decoder: Decoder,
    last_sequence: Option<u32>,
    dropped: u64,
}

impl FrameChannel {
    /// Connect to the data port.
    pub async fn open(
        host: &str,
        port: u16,
        decoder: Decoder,
        options: StreamOptions,
    ) -> Result<Self> {
        let connect = TcpStream::connect((host, port));
        let stream = match tokio::time::timeout(options.connect_timeout, connect).await {
            Err(_) => {
                return Err(VisionaryError::connection_failed(format!(
                    "data connect to {}:{} timed out after {:?}",
                    host, port, options.connect_timeout
                )));
            }
            Ok(Err(e)) => {
                return Err(VisionaryError::connection_failed_with_source(
                    format!("data connect to {}:{} failed", host, port),
                    e,
                ));
            }
            Ok(Ok(stream)) => stream,
        };
        let peer = stream.peer_addr()?;

        info!(peer = %peer, family = ?decoder.family(), "Frame channel opened");
        Ok(Self {
            stream: Some(stream),
            peer,
            assembler: BlobAssembler::new(options.max_blob_size),
            decoder,
            last_sequence: None,
            dropped: 0,
        })
    }

    /// Wait up to `timeout` for the next complete frame.
    ///
    /// A [`Timeout`](VisionaryError::Timeout) keeps partially received data, so
    /// the next call continues where this one stopped. End of stream is a fatal
    /// [`Connection`](VisionaryError::Connection) error.
    pub async fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(blob) = self.assembler.try_extract()? {
                self.track_sequence(blob.sequence)?;
                trace!(sequence = blob.sequence, segments = blob.segments.len(), "Blob assembled");
                return self.decoder.decode(&blob);
            }

            let stream =
                self.stream.as_mut().ok_or_else(|| VisionaryError::not_connected("frame channel"))?;
            let read = timeout_at(deadline, stream.read_buf(self.assembler.buffer_mut())).await;
            match read {
                Err(_) => return Err(VisionaryError::timeout("next_frame", timeout)),
                Ok(Ok(0)) => {
                    self.stream = None;
                    return Err(VisionaryError::connection_failed("data stream closed by device"));
                }
                Ok(Ok(n)) => trace!(bytes = n, buffered = self.assembler.buffered(), "Data received"),
                Ok(Err(e)) => {
                    self.stream = None;
                    return Err(VisionaryError::connection_failed_with_source("data read failed", e));
                }
            }
        }
    }

    fn track_sequence(&mut self, sequence: u32) -> Result<()> {
        if let Some(last) = self.last_sequence {
            if sequence <= last {
                return Err(VisionaryError::protocol(
                    "frame sequence",
                    format!("sequence {} after {}", sequence, last),
                ));
            }
            let gap = u64::from(sequence - last - 1);
            if gap > 0 {
                self.dropped += gap;
                debug!(last, sequence, dropped = self.dropped, "Frames dropped");
            }
        }
        self.last_sequence = Some(sequence);
        Ok(())
    }

    /// Frames skipped by the device, from sequence gaps.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Release the socket. Later reads fail with a connection error.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Data socket shutdown failed: {}", e);
            }
            self.assembler.clear();
            info!(peer = %self.peer, dropped = self.dropped, "Frame channel closed");
        }
    }
}
