//! Forward-only reader over a command payload

use super::Command;
use super::codec::{ColaParam, decode_value, take_slice};
use crate::Result;
use crate::types::{ParamType, Value};

/// Sequential decoder for a [`Command`] payload.
///
/// Each read advances an internal cursor; there is no seek or rewind. Records and
/// arrays are read field by field, in the order the device defines them. Reading
/// past the end fails with [`TruncatedPayload`](crate::VisionaryError::TruncatedPayload)
/// and leaves the cursor where it was.
#[derive(Debug)]
pub struct CommandReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> CommandReader<'a> {
    pub fn new(command: &'a Command) -> Self {
        Self::from_payload(command.payload())
    }

    pub fn from_payload(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    /// Read any [`ColaParam`].
    pub fn read<T: ColaParam>(&mut self) -> Result<T> {
        T::decode(self.payload, &mut self.cursor)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.read()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read()
    }

    pub fn read_flex_string(&mut self) -> Result<String> {
        self.read()
    }

    /// Read a value whose type is only known at runtime.
    pub fn read_value(&mut self, param_type: ParamType) -> Result<Value> {
        decode_value(param_type, self.payload, &mut self.cursor)
    }

    /// Read `count` consecutive values of the same type.
    pub fn read_array<T: ColaParam>(&mut self, count: usize) -> Result<Vec<T>> {
        let start = self.cursor;
        let mut values = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            match self.read() {
                Ok(value) => values.push(value),
                Err(e) => {
                    self.cursor = start;
                    return Err(e);
                }
            }
        }
        Ok(values)
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        take_slice(self.payload, &mut self.cursor, len)
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VisionaryError;
    use crate::cola::CommandBuilder;

    #[test]
    fn reads_exhaust_exactly_what_was_built() {
        let command = CommandBuilder::write_variable("record")
            .param_u32(7)
            .param_u16(3)
            .param_flex_string("ext")
            .param_bool(true)
            .build()
            .unwrap();

        let mut reader = CommandReader::new(&command);
        assert_eq!(reader.read_u32().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 3);
        assert_eq!(reader.read_flex_string().unwrap(), "ext");
        assert!(reader.read_bool().unwrap());
        assert!(reader.is_exhausted());

        let err = reader.read_u8().unwrap_err();
        assert!(matches!(err, VisionaryError::TruncatedPayload { available: 0, .. }));
    }

    #[test]
    fn array_read_is_all_or_nothing() {
        let command = CommandBuilder::write_variable("values")
            .param_u16(1)
            .param_u16(2)
            .param_u16(3)
            .build()
            .unwrap();
        let mut reader = CommandReader::new(&command);

        assert!(reader.read_array::<u16>(4).is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_array::<u16>(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn mismatched_types_read_wrong_values_without_error() {
        let command = CommandBuilder::write_variable("x").param_u16(0x0102).build().unwrap();
        let mut reader = CommandReader::new(&command);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
    }

    #[test]
    fn read_bytes_borrows_from_payload() {
        let command =
            CommandBuilder::write_variable("x").param_bytes(&[1, 2, 3]).build().unwrap();
        let mut reader = CommandReader::new(&command);
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);
        assert_eq!(reader.remaining(), 1);
    }
}
