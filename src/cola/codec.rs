//! Binary encoding of CoLa parameters
//!
//! Multi-byte integers and floats are big-endian, booleans take one byte and flex
//! strings are a u16 length followed by the raw bytes. The wire carries no type
//! tags: the caller decodes in exactly the order and with exactly the types the
//! device variable defines. A mismatch yields wrong values, not an error.

use bytes::{BufMut, BytesMut};

use crate::types::{ParamType, Value};
use crate::{Result, VisionaryError};

/// Trait for scalar types with a CoLa binary representation.
pub trait ColaParam: Sized {
    /// Parameter type this Rust type maps to
    const TYPE: ParamType;

    /// Append the encoded value to `buf`.
    ///
    /// Fails without writing anything when the value cannot be represented.
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;

    /// Decode a value at `cursor`, advancing it by the bytes consumed.
    fn decode(data: &[u8], cursor: &mut usize) -> Result<Self>;
}

/// Read exactly `N` bytes at the cursor.
fn take<const N: usize>(data: &[u8], cursor: &mut usize) -> Result<[u8; N]> {
    let bytes = take_slice(data, cursor, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Read `len` bytes at the cursor.
pub(crate) fn take_slice<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
    let start = *cursor;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or(VisionaryError::TruncatedPayload {
            offset: start,
            needed: len,
            available: data.len().saturating_sub(start),
        })?;
    *cursor = start + len;
    Ok(bytes)
}

macro_rules! impl_numeric_param {
    ($ty:ty, $param:ident, $put:ident) => {
        impl ColaParam for $ty {
            const TYPE: ParamType = ParamType::$param;

            fn encode(&self, buf: &mut BytesMut) -> Result<()> {
                buf.$put(*self);
                Ok(())
            }

            fn decode(data: &[u8], cursor: &mut usize) -> Result<Self> {
                Ok(<$ty>::from_be_bytes(take(data, cursor)?))
            }
        }
    };
}

impl_numeric_param!(u8, USInt, put_u8);
impl_numeric_param!(i8, SInt, put_i8);
impl_numeric_param!(u16, UInt, put_u16);
impl_numeric_param!(i16, Int, put_i16);
impl_numeric_param!(u32, UDInt, put_u32);
impl_numeric_param!(i32, DInt, put_i32);
impl_numeric_param!(u64, ULInt, put_u64);
impl_numeric_param!(i64, LInt, put_i64);
impl_numeric_param!(f32, Real, put_f32);
impl_numeric_param!(f64, LReal, put_f64);

impl ColaParam for bool {
    const TYPE: ParamType = ParamType::Bool;

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(u8::from(*self));
        Ok(())
    }

    fn decode(data: &[u8], cursor: &mut usize) -> Result<Self> {
        let [byte] = take::<1>(data, cursor)?;
        Ok(byte != 0)
    }
}

/// Largest string a flex string length prefix can describe.
pub const MAX_FLEX_STRING_LEN: usize = u16::MAX as usize;

impl ColaParam for String {
    const TYPE: ParamType = ParamType::FlexString;

    /// Strings longer than [`MAX_FLEX_STRING_LEN`] bytes are an
    /// [`InvalidCommand`](VisionaryError::InvalidCommand) error.
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let len = u16::try_from(self.len()).map_err(|_| VisionaryError::InvalidCommand {
            details: format!("flex string of {} bytes exceeds {}", self.len(), MAX_FLEX_STRING_LEN),
        })?;
        buf.put_u16(len);
        buf.put_slice(self.as_bytes());
        Ok(())
    }

    fn decode(data: &[u8], cursor: &mut usize) -> Result<Self> {
        let len = u16::decode(data, cursor)? as usize;
        let start = *cursor;
        let bytes = take_slice(data, cursor, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            VisionaryError::protocol(
                "flex string decoding",
                format!("invalid UTF-8 at offset {}: {}", start, e),
            )
        })
    }
}

/// Decode a value of a type chosen at runtime.
pub fn decode_value(param_type: ParamType, data: &[u8], cursor: &mut usize) -> Result<Value> {
    Ok(match param_type {
        ParamType::Bool => Value::Bool(bool::decode(data, cursor)?),
        ParamType::USInt => Value::USInt(u8::decode(data, cursor)?),
        ParamType::SInt => Value::SInt(i8::decode(data, cursor)?),
        ParamType::UInt => Value::UInt(u16::decode(data, cursor)?),
        ParamType::Int => Value::Int(i16::decode(data, cursor)?),
        ParamType::UDInt => Value::UDInt(u32::decode(data, cursor)?),
        ParamType::DInt => Value::DInt(i32::decode(data, cursor)?),
        ParamType::ULInt => Value::ULInt(u64::decode(data, cursor)?),
        ParamType::LInt => Value::LInt(i64::decode(data, cursor)?),
        ParamType::Real => Value::Real(f32::decode(data, cursor)?),
        ParamType::LReal => Value::LReal(f64::decode(data, cursor)?),
        ParamType::FlexString => Value::FlexString(String::decode(data, cursor)?),
    })
}

/// Encode a runtime value.
pub fn encode_value(value: &Value, buf: &mut BytesMut) -> Result<()> {
    match value {
        Value::Bool(v) => v.encode(buf),
        Value::USInt(v) => v.encode(buf),
        Value::SInt(v) => v.encode(buf),
        Value::UInt(v) => v.encode(buf),
        Value::Int(v) => v.encode(buf),
        Value::UDInt(v) => v.encode(buf),
        Value::DInt(v) => v.encode(buf),
        Value::ULInt(v) => v.encode(buf),
        Value::LInt(v) => v.encode(buf),
        Value::Real(v) => v.encode(buf),
        Value::LReal(v) => v.encode(buf),
        Value::FlexString(v) => v.encode(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip<T: ColaParam>(value: &T) -> (T, usize, usize) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf).unwrap();
        let mut cursor = 0;
        let decoded = T::decode(&buf, &mut cursor).expect("decode");
        (decoded, cursor, buf.len())
    }

    proptest! {
        #[test]
        fn prop_u32_roundtrip(value in any::<u32>()) {
            let (decoded, cursor, len) = roundtrip(&value);
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(cursor, len);
            prop_assert_eq!(len, 4);
        }

        #[test]
        fn prop_i16_roundtrip(value in any::<i16>()) {
            prop_assert_eq!(roundtrip(&value).0, value);
        }

        #[test]
        fn prop_i64_roundtrip(value in any::<i64>()) {
            prop_assert_eq!(roundtrip(&value).0, value);
        }

        #[test]
        fn prop_f64_roundtrip_bit_exact(value in any::<f64>()) {
            prop_assert_eq!(roundtrip(&value).0.to_bits(), value.to_bits());
        }

        #[test]
        fn prop_f32_roundtrip_bit_exact(value in any::<f32>()) {
            prop_assert_eq!(roundtrip(&value).0.to_bits(), value.to_bits());
        }

        #[test]
        fn prop_flex_string_roundtrip(value in "[ -~]{0,64}") {
            let (decoded, cursor, len) = roundtrip(&value);
            prop_assert_eq!(&decoded, &value);
            prop_assert_eq!(cursor, len);
            prop_assert_eq!(len, value.len() + 2);
        }
    }

    #[test]
    fn boundary_values_roundtrip() {
        assert_eq!(roundtrip(&u8::MAX).0, u8::MAX);
        assert_eq!(roundtrip(&i8::MIN).0, i8::MIN);
        assert_eq!(roundtrip(&u16::MAX).0, u16::MAX);
        assert_eq!(roundtrip(&i32::MIN).0, i32::MIN);
        assert_eq!(roundtrip(&i32::MAX).0, i32::MAX);
        assert_eq!(roundtrip(&u64::MAX).0, u64::MAX);
        assert_eq!(roundtrip(&0u64).0, 0);
        assert!(roundtrip(&true).0);
        assert!(!roundtrip(&false).0);
        assert_eq!(roundtrip(&-0.0f64).0.to_bits(), (-0.0f64).to_bits());
        assert!(roundtrip(&f32::NAN).0.is_nan());
        assert_eq!(roundtrip(&String::new()).0, "");
    }

    #[test]
    fn integers_are_big_endian() {
        let mut buf = BytesMut::new();
        150_000u32.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x02, 0x49, 0xF0]);

        let mut buf = BytesMut::new();
        "ab".to_string().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x02, b'a', b'b']);
    }

    #[test]
    fn oversized_flex_string_is_refused_not_cut() {
        let mut buf = BytesMut::new();
        let err = "x".repeat(70_000).encode(&mut buf).unwrap_err();
        assert!(matches!(err, VisionaryError::InvalidCommand { .. }));
        assert!(buf.is_empty());

        let longest = "y".repeat(MAX_FLEX_STRING_LEN);
        longest.encode(&mut buf).unwrap();
        assert_eq!(roundtrip(&longest).0.len(), MAX_FLEX_STRING_LEN);

        let mut buf = BytesMut::new();
        assert!(encode_value(&Value::FlexString("z".repeat(MAX_FLEX_STRING_LEN + 1)), &mut buf).is_err());
    }

    #[test]
    fn any_nonzero_byte_is_true() {
        let mut cursor = 0;
        assert!(bool::decode(&[0x7f], &mut cursor).unwrap());
    }

    #[test]
    fn decoding_past_end_reports_truncation() {
        let mut cursor = 1;
        let err = u32::decode(&[0, 1, 2], &mut cursor).unwrap_err();
        assert!(matches!(
            err,
            VisionaryError::TruncatedPayload { offset: 1, needed: 4, available: 2 }
        ));
        assert_eq!(cursor, 1, "cursor must not move on failure");
    }

    #[test]
    fn flex_string_with_short_body_is_truncated() {
        let mut cursor = 0;
        let err = String::decode(&[0x00, 0x05, b'a'], &mut cursor).unwrap_err();
        assert!(matches!(err, VisionaryError::TruncatedPayload { needed: 5, .. }));
    }

    #[test]
    fn flex_string_rejects_invalid_utf8() {
        let mut cursor = 0;
        let err = String::decode(&[0x00, 0x01, 0xff], &mut cursor).unwrap_err();
        assert!(matches!(err, VisionaryError::Protocol { .. }));
    }

    #[test]
    fn runtime_values_use_the_static_codec() {
        let values = vec![
            Value::Bool(true),
            Value::USInt(7),
            Value::Int(-2),
            Value::UDInt(150_000),
            Value::LReal(42.5),
            Value::FlexString("MSinfo".into()),
        ];
        let mut buf = BytesMut::new();
        for value in &values {
            encode_value(value, &mut buf).unwrap();
        }

        let mut cursor = 0;
        for value in &values {
            let decoded = decode_value(value.param_type(), &buf, &mut cursor).unwrap();
            assert_eq!(&decoded, value);
        }
        assert_eq!(cursor, buf.len());
    }
}
