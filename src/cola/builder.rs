//! Builder for outgoing commands

use bytes::BytesMut;

use super::codec::{ColaParam, encode_value};
use super::command::validate_name;
use super::{Command, CommandType};
use crate::types::Value;
use crate::{Result, VisionaryError};

/// Accumulates typed parameters and produces a [`Command`].
///
/// Parameters are appended in call order with no type information; the device
/// knows the layout from the variable or method name.
///
/// ```rust
/// use visionary::cola::{CommandBuilder, CommandReader, CommandType};
///
/// let command = CommandBuilder::new(CommandType::WriteVariable, "autoExposureROI")
///     .param_u32(160)
///     .param_u32(480)
///     .param_u32(128)
///     .param_u32(384)
///     .build()
///     .unwrap();
///
/// let mut reader = CommandReader::new(&command);
/// assert_eq!(reader.read_u32().unwrap(), 160);
/// ```
#[derive(Debug)]
#[must_use = "a builder does nothing until build() is called"]
pub struct CommandBuilder {
    kind: CommandType,
    name: String,
    payload: BytesMut,
    error: Option<VisionaryError>,
}

impl CommandBuilder {
    pub fn new(kind: CommandType, name: impl Into<String>) -> Self {
        Self { kind, name: name.into(), payload: BytesMut::new(), error: None }
    }

    pub fn read_variable(name: impl Into<String>) -> Self {
        Self::new(CommandType::ReadVariable, name)
    }

    pub fn write_variable(name: impl Into<String>) -> Self {
        Self::new(CommandType::WriteVariable, name)
    }

    pub fn invoke_method(name: impl Into<String>) -> Self {
        Self::new(CommandType::MethodInvocation, name)
    }

    /// Append any [`ColaParam`]. Values that cannot be encoded fail at `build()`.
    pub fn param<T: ColaParam>(mut self, value: T) -> Self {
        if let Err(e) = value.encode(&mut self.payload) {
            self.record_error(e);
        }
        self
    }

    pub fn param_bool(self, value: bool) -> Self {
        self.param(value)
    }

    pub fn param_u8(self, value: u8) -> Self {
        self.param(value)
    }

    pub fn param_i8(self, value: i8) -> Self {
        self.param(value)
    }

    pub fn param_u16(self, value: u16) -> Self {
        self.param(value)
    }

    pub fn param_i16(self, value: i16) -> Self {
        self.param(value)
    }

    pub fn param_u32(self, value: u32) -> Self {
        self.param(value)
    }

    pub fn param_i32(self, value: i32) -> Self {
        self.param(value)
    }

    pub fn param_u64(self, value: u64) -> Self {
        self.param(value)
    }

    pub fn param_i64(self, value: i64) -> Self {
        self.param(value)
    }

    pub fn param_f32(self, value: f32) -> Self {
        self.param(value)
    }

    pub fn param_f64(self, value: f64) -> Self {
        self.param(value)
    }

    /// Append a length-prefixed string. Strings over 65535 bytes fail at `build()`.
    pub fn param_flex_string(self, value: &str) -> Self {
        self.param(value.to_string())
    }

    /// Append a runtime value.
    pub fn param_value(mut self, value: &Value) -> Self {
        if let Err(e) = encode_value(value, &mut self.payload) {
            self.record_error(e);
        }
        self
    }

    /// Append raw bytes, e.g. a fixed-size byte array.
    pub fn param_bytes(mut self, bytes: &[u8]) -> Self {
        self.payload.extend_from_slice(bytes);
        self
    }

    fn record_error(&mut self, error: VisionaryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Finalize the command. Consumes the builder.
    pub fn build(self) -> Result<Command> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.kind.is_request() {
            return Err(VisionaryError::InvalidCommand {
                details: format!("{} is not a request kind", self.kind),
            });
        }
        validate_name(&self.name)?;
        Ok(Command::from_parts(self.kind, self.name, self.payload.freeze()))
    }
}
