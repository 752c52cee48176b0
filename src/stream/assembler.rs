//! Reassembly of streaming blobs from arbitrary TCP deliveries
//!
//! A pure state machine over pushed bytes, independent of the socket:
//! - `Searching`: looking for the magic marker and the length prefix
//! - `WaitingForBody`: prefix parsed, need body plus CRC trailer

use bytes::{Buf, BytesMut};

use super::blob::{
    BLOB_CRC, BLOB_MAGIC, BODY_HEADER_SIZE, DEFAULT_MAX_BLOB_SIZE, PREFIX_SIZE, RawBlob,
    TRAILER_SIZE,
};
use crate::{Result, VisionaryError};

#[derive(Debug, Clone, Copy)]
enum State {
    Searching,
    WaitingForBody { body_len: usize },
}

/// Accumulates data channel bytes and yields complete [`RawBlob`]s.
///
/// Splitting the same byte stream into any number of deliveries yields the same
/// blobs. Bytes before a magic marker are dropped and reported once as a protocol
/// violation; a blob with a bad CRC or an inconsistent segment table is consumed
/// and reported, after which assembly continues with the next blob.
#[derive(Debug)]
pub struct BlobAssembler {
    buffer: BytesMut,
    state: State,
    max_body: usize,
}

impl Default for BlobAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOB_SIZE)
    }
}

impl BlobAssembler {
    pub fn new(max_body: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(64 * 1024), state: State::Searching, max_body }
    }

    /// Receive buffer for socket reads.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held but not yet assembled.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Searching;
    }

    /// Extract the next blob, `Ok(None)` if more bytes are needed.
    pub fn try_extract(&mut self) -> Result<Option<RawBlob>> {
        loop {
            match self.state {
                State::Searching => {
                    self.resync()?;
                    if self.buffer.len() < PREFIX_SIZE {
                        return Ok(None);
                    }
                    let body_len = u32::from_be_bytes([
                        self.buffer[4],
                        self.buffer[5],
                        self.buffer[6],
                        self.buffer[7],
                    ]) as usize;

                    if body_len > self.max_body || body_len < BODY_HEADER_SIZE {
                        // drop the marker so the next search starts past it
                        self.buffer.advance(BLOB_MAGIC.len());
                        return Err(VisionaryError::protocol(
                            "blob length",
                            format!(
                                "declared body of {} bytes outside {}..={}",
                                body_len, BODY_HEADER_SIZE, self.max_body
                            ),
                        ));
                    }
                    self.state = State::WaitingForBody { body_len };
                }
                State::WaitingForBody { body_len } => {
                    let total = PREFIX_SIZE + body_len + TRAILER_SIZE;
                    if self.buffer.len() < total {
                        self.buffer.reserve(total - self.buffer.len());
                        return Ok(None);
                    }

                    let mut frame = self.buffer.split_to(total);
                    self.state = State::Searching;
                    frame.advance(PREFIX_SIZE);
                    let trailer = frame.split_off(body_len);
                    let declared =
                        u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
                    let computed = BLOB_CRC.checksum(&frame);
                    if declared != computed {
                        return Err(VisionaryError::protocol(
                            "blob checksum",
                            format!("CRC {:#010x}, computed {:#010x}", declared, computed),
                        ));
                    }
                    return RawBlob::parse_body(frame.freeze()).map(Some);
                }
            }
        }
    }

    /// Drop bytes preceding the next magic marker.
    fn resync(&mut self) -> Result<()> {
        if self.buffer.starts_with(&BLOB_MAGIC) {
            return Ok(());
        }
        let skip = match self.buffer.windows(BLOB_MAGIC.len()).position(|w| w == BLOB_MAGIC) {
            Some(position) => position,
            // keep a tail that may be the start of a split marker
            None => {
                let tail = self.buffer.iter().rev().take_while(|b| **b == BLOB_MAGIC[0]).count();
                self.buffer.len() - tail.min(BLOB_MAGIC.len() - 1)
            }
        };
        if skip == 0 {
            return Ok(());
        }
        self.buffer.advance(skip);
        Err(VisionaryError::protocol(
            "blob stream",
            format!("discarded {} bytes before magic marker", skip),
        ))
    }
}
