//! Control channel framing for the CoLa-B and CoLa-2 protocol variants
//!
//! ## CoLa-B
//!
//! ```text
//! 02 02 02 02 | u32 length | body | u8 XOR checksum of body
//! ```
//!
//! ## CoLa-2
//!
//! ```text
//! 02 02 02 02 | u32 length | u8 hub counter | u8 NoC | u32 session id | u16 request id | body
//! ```
//!
//! The CoLa-2 length covers the 8 routing bytes and the body; there is no checksum.
//! All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, VisionaryError};

/// Start-of-frame marker shared by both variants.
pub const STX: [u8; 4] = [0x02; 4];

/// Default upper bound for a control frame body.
pub const DEFAULT_MAX_CONTROL_FRAME: usize = 1024 * 1024;

const LENGTH_PREFIX_SIZE: usize = 8;
const COLA2_ROUTING_SIZE: usize = 8;

/// Framing variant of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Legacy binary framing with XOR checksum
    ColaB,
    /// Session-based framing with request ids
    Cola2,
}

impl ProtocolVariant {
    /// Default control port of a device speaking this variant.
    pub const fn default_port(self) -> u16 {
        match self {
            ProtocolVariant::ColaB => 2112,
            ProtocolVariant::Cola2 => 2122,
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::ColaB => f.write_str("CoLa-B"),
            ProtocolVariant::Cola2 => f.write_str("CoLa-2"),
        }
    }
}

/// CoLa-2 routing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cola2Header {
    pub session_id: u32,
    pub request_id: u16,
}

/// One complete control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    /// Routing fields, `None` for CoLa-B
    pub header: Option<Cola2Header>,
    pub body: Bytes,
}

/// XOR of all bytes, the CoLa-B checksum.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a body into a wire frame. `header` is ignored for CoLa-B.
pub fn encode_frame(variant: ProtocolVariant, header: Cola2Header, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + COLA2_ROUTING_SIZE + body.len() + 1);
    buf.put_slice(&STX);
    match variant {
        ProtocolVariant::ColaB => {
            buf.put_u32(body.len() as u32);
            buf.put_slice(body);
            buf.put_u8(xor_checksum(body));
        }
        ProtocolVariant::Cola2 => {
            buf.put_u32((COLA2_ROUTING_SIZE + body.len()) as u32);
            buf.put_u8(0);
            buf.put_u8(0);
            buf.put_u32(header.session_id);
            buf.put_u16(header.request_id);
            buf.put_slice(body);
        }
    }
    buf.freeze()
}

/// Accumulates control channel bytes and extracts complete frames.
#[derive(Debug)]
pub struct ControlFrameBuffer {
    variant: ProtocolVariant,
    buffer: BytesMut,
    max_frame: usize,
}

impl ControlFrameBuffer {
    pub fn new(variant: ProtocolVariant, max_frame: usize) -> Self {
        Self { variant, buffer: BytesMut::with_capacity(4096), max_frame }
    }

    /// Mutable access to the receive buffer for socket reads.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Extract one frame if complete.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On a protocol violation the
    /// buffer is cleared, since the control stream cannot be resynchronized.
    pub fn try_extract(&mut self) -> Result<Option<ControlFrame>> {
        match self.try_extract_inner() {
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
            ok => ok,
        }
    }

    fn try_extract_inner(&mut self) -> Result<Option<ControlFrame>> {
        let stx_seen = self.buffer.len().min(STX.len());
        if self.buffer[..stx_seen] != STX[..stx_seen] {
            return Err(VisionaryError::protocol(
                "control frame",
                format!("expected STX, got {:02x?}", &self.buffer[..stx_seen]),
            ));
        }
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length =
            u32::from_be_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]])
                as usize;
        if length > self.max_frame {
            return Err(VisionaryError::protocol(
                "control frame",
                format!("length {} exceeds maximum {}", length, self.max_frame),
            ));
        }

        match self.variant {
            ProtocolVariant::ColaB => {
                let total = LENGTH_PREFIX_SIZE + length + 1;
                if self.buffer.len() < total {
                    return Ok(None);
                }
                let mut frame = self.buffer.split_to(total);
                frame.advance(LENGTH_PREFIX_SIZE);
                let checksum = frame[length];
                frame.truncate(length);
                let expected = xor_checksum(&frame);
                if checksum != expected {
                    return Err(VisionaryError::protocol(
                        "control frame",
                        format!("checksum {:#04x}, computed {:#04x}", checksum, expected),
                    ));
                }
                Ok(Some(ControlFrame { header: None, body: frame.freeze() }))
            }
            ProtocolVariant::Cola2 => {
                if length < COLA2_ROUTING_SIZE {
                    return Err(VisionaryError::protocol(
                        "control frame",
                        format!("CoLa-2 length {} shorter than routing header", length),
                    ));
                }
                let total = LENGTH_PREFIX_SIZE + length;
                if self.buffer.len() < total {
                    return Ok(None);
                }
                let mut frame = self.buffer.split_to(total);
                frame.advance(LENGTH_PREFIX_SIZE);
                let _hub_counter = frame.get_u8();
                let _noc = frame.get_u8();
                let session_id = frame.get_u32();
                let request_id = frame.get_u16();
                Ok(Some(ControlFrame {
                    header: Some(Cola2Header { session_id, request_id }),
                    body: frame.freeze(),
                }))
            }
        }
    }
}
