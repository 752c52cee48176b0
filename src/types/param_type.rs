//! CoLa parameter type definitions

use serde::{Deserialize, Serialize};

/// Scalar types a device variable or method argument can be made of.
///
/// Names follow the device interface description (SOPAS types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    /// Boolean, one byte
    Bool,
    /// Unsigned 8-bit integer
    USInt,
    /// Signed 8-bit integer
    SInt,
    /// Unsigned 16-bit integer
    UInt,
    /// Signed 16-bit integer
    Int,
    /// Unsigned 32-bit integer
    UDInt,
    /// Signed 32-bit integer
    DInt,
    /// Unsigned 64-bit integer
    ULInt,
    /// Signed 64-bit integer
    LInt,
    /// 32-bit IEEE-754 float
    Real,
    /// 64-bit IEEE-754 float
    LReal,
    /// u16 length prefix followed by raw bytes
    FlexString,
}

impl ParamType {
    /// Returns the encoded size in bytes, `None` for variable-length types.
    pub const fn size(&self) -> Option<usize> {
        match self {
            ParamType::Bool | ParamType::USInt | ParamType::SInt => Some(1),
            ParamType::UInt | ParamType::Int => Some(2),
            ParamType::UDInt | ParamType::DInt | ParamType::Real => Some(4),
            ParamType::ULInt | ParamType::LInt | ParamType::LReal => Some(8),
            ParamType::FlexString => None,
        }
    }
}

/// Runtime value holding any CoLa parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    USInt(u8),
    SInt(i8),
    UInt(u16),
    Int(i16),
    UDInt(u32),
    DInt(i32),
    ULInt(u64),
    LInt(i64),
    Real(f32),
    LReal(f64),
    FlexString(String),
}

impl Value {
    /// The parameter type this value encodes as.
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Bool(_) => ParamType::Bool,
            Value::USInt(_) => ParamType::USInt,
            Value::SInt(_) => ParamType::SInt,
            Value::UInt(_) => ParamType::UInt,
            Value::Int(_) => ParamType::Int,
            Value::UDInt(_) => ParamType::UDInt,
            Value::DInt(_) => ParamType::DInt,
            Value::ULInt(_) => ParamType::ULInt,
            Value::LInt(_) => ParamType::LInt,
            Value::Real(_) => ParamType::Real,
            Value::LReal(_) => ParamType::LReal,
            Value::FlexString(_) => ParamType::FlexString,
        }
    }
}
