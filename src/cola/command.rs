//! Command values exchanged over the control channel

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ColaError;
use crate::{Result, VisionaryError};

/// Longest variable or method name accepted.
pub const MAX_NAME_LEN: usize = 128;

/// Kind of a CoLa command, identified on the wire by a three-letter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    ReadVariable,
    ReadVariableResponse,
    WriteVariable,
    WriteVariableResponse,
    MethodInvocation,
    MethodReturnValue,
    Error,
}

impl CommandType {
    pub const fn tag(self) -> &'static [u8; 3] {
        match self {
            CommandType::ReadVariable => b"sRN",
            CommandType::ReadVariableResponse => b"sRA",
            CommandType::WriteVariable => b"sWN",
            CommandType::WriteVariableResponse => b"sWA",
            CommandType::MethodInvocation => b"sMN",
            CommandType::MethodReturnValue => b"sAN",
            CommandType::Error => b"sFA",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"sRN" => Some(CommandType::ReadVariable),
            b"sRA" => Some(CommandType::ReadVariableResponse),
            b"sWN" => Some(CommandType::WriteVariable),
            b"sWA" => Some(CommandType::WriteVariableResponse),
            b"sMN" => Some(CommandType::MethodInvocation),
            b"sAN" => Some(CommandType::MethodReturnValue),
            b"sFA" => Some(CommandType::Error),
            _ => None,
        }
    }

    /// Whether this kind is sent by the client.
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            CommandType::ReadVariable | CommandType::WriteVariable | CommandType::MethodInvocation
        )
    }

    /// Successful response kind for a request kind.
    pub const fn response_kind(self) -> Option<Self> {
        match self {
            CommandType::ReadVariable => Some(CommandType::ReadVariableResponse),
            CommandType::WriteVariable => Some(CommandType::WriteVariableResponse),
            CommandType::MethodInvocation => Some(CommandType::MethodReturnValue),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(std::str::from_utf8(self.tag()).unwrap_or("???"))
    }
}

/// Check a variable or method name: 1 to [`MAX_NAME_LEN`] printable ASCII bytes, no space.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(VisionaryError::InvalidCommand {
            details: format!("name length {} outside 1..={}", name.len(), MAX_NAME_LEN),
        });
    }
    if let Some(bad) = name.bytes().find(|b| !(0x21..=0x7e).contains(b)) {
        return Err(VisionaryError::InvalidCommand {
            details: format!("name '{}' contains byte {:#04x}", name.escape_debug(), bad),
        });
    }
    Ok(())
}

/// One protocol exchange unit: a request or a response.
///
/// Immutable once built. Outgoing commands come from
/// [`CommandBuilder`](super::CommandBuilder); incoming ones are decoded from wire frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandType,
    name: String,
    payload: Bytes,
    error: ColaError,
}

impl Command {
    pub(crate) fn from_parts(kind: CommandType, name: String, payload: Bytes) -> Self {
        Self { kind, name, payload, error: ColaError::Ok }
    }

    /// Error response attributed to the request it answers.
    pub(crate) fn error_response(name: impl Into<String>, error: ColaError) -> Self {
        Self { kind: CommandType::Error, name: name.into(), payload: Bytes::new(), error }
    }

    pub fn kind(&self) -> CommandType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Device result code, `ColaError::Ok` for requests and successful responses.
    pub fn error(&self) -> ColaError {
        self.error
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_ok()
    }

    /// Turn a non-OK response into a [`VisionaryError::Device`].
    pub fn into_result(self) -> Result<Self> {
        if self.error.is_ok() {
            Ok(self)
        } else {
            Err(VisionaryError::device(self.name, self.error))
        }
    }

    /// Append the framing-independent body: tag, name and payload.
    pub(crate) fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_slice(self.kind.tag());
        if self.kind == CommandType::Error {
            buf.put_u16(self.error.code());
            return;
        }
        buf.put_u8(b' ');
        buf.put_slice(self.name.as_bytes());
        if !self.payload.is_empty() || self.kind == CommandType::WriteVariable {
            buf.put_u8(b' ');
            buf.put_slice(&self.payload);
        }
    }

    /// Decode a framing-independent body.
    ///
    /// Error bodies carry no name; the returned command has an empty name.
    pub(crate) fn decode_body(body: &[u8]) -> Result<Self> {
        let tag = body
            .get(..3)
            .ok_or_else(|| VisionaryError::protocol("command body", "shorter than a tag"))?;
        let kind = CommandType::from_tag(tag).ok_or_else(|| {
            VisionaryError::protocol(
                "command body",
                format!("unknown command tag {:?}", String::from_utf8_lossy(tag)),
            )
        })?;

        if kind == CommandType::Error {
            let code = body.get(3..5).ok_or_else(|| {
                VisionaryError::protocol("error response", "missing error code")
            })?;
            let code = u16::from_be_bytes([code[0], code[1]]);
            return Ok(Self::error_response(String::new(), ColaError::from_code(code)));
        }

        match body.get(3) {
            Some(b' ') => {}
            _ => return Err(VisionaryError::protocol("command body", "missing name separator")),
        }

        let rest = &body[4..];
        let (name, payload) = match rest.iter().position(|b| *b == b' ') {
            Some(space) => (&rest[..space], &rest[space + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        let name = std::str::from_utf8(name)
            .map_err(|_| VisionaryError::protocol("command body", "name is not ASCII"))?;
        validate_name(name).map_err(|e| VisionaryError::protocol("command body", e.to_string()))?;

        Ok(Self::from_parts(kind, name.to_string(), Bytes::copy_from_slice(payload)))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} payload bytes)", self.kind, self.name, self.payload.len())?;
        if !self.error.is_ok() {
            write!(f, ": {}", self.error)?;
        }
        Ok(())
    }
}
