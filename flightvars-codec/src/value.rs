use crate::error::DecodeError;
use crate::{get_f32, get_u16, get_u32, get_u8, Frame, FromToU8};
use bytes::BufMut;
use core::fmt;
use std::io::Cursor;

/// The kind of a variable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// 0, a boolean flag
    Bool,
    /// 1, an unsigned 8-bit integer
    Byte,
    /// 2, an unsigned 16-bit integer
    Word,
    /// 3, an unsigned 32-bit integer
    DWord,
    /// 4, an IEEE-754 single precision float
    Float,
}

impl FromToU8<VariableType> for VariableType {
    fn to_u8(&self) -> u8 {
        match *self {
            VariableType::Bool => 0,
            VariableType::Byte => 1,
            VariableType::Word => 2,
            VariableType::DWord => 3,
            VariableType::Float => 4,
        }
    }

    fn from_u8(byte: u8) -> Result<VariableType, DecodeError> {
        match byte {
            0 => Ok(VariableType::Bool),
            1 => Ok(VariableType::Byte),
            2 => Ok(VariableType::Word),
            3 => Ok(VariableType::DWord),
            4 => Ok(VariableType::Float),
            n => Err(DecodeError::unexpected(
                "a variable type code in range 0..=4",
                format!("code {}", n),
            )),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            VariableType::Bool => "bool".fmt(fmt),
            VariableType::Byte => "byte".fmt(fmt),
            VariableType::Word => "word".fmt(fmt),
            VariableType::DWord => "dword".fmt(fmt),
            VariableType::Float => "float".fmt(fmt),
        }
    }
}

/// A variable value: one of five primitive kinds carrying its payload.
/// Values are immutable once constructed.
#[derive(Debug, Clone, Copy)]
pub enum VariableValue {
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    Float(f32),
}

impl VariableValue {
    pub fn var_type(&self) -> VariableType {
        match *self {
            VariableValue::Bool(_) => VariableType::Bool,
            VariableValue::Byte(_) => VariableType::Byte,
            VariableValue::Word(_) => VariableType::Word,
            VariableValue::DWord(_) => VariableType::DWord,
            VariableValue::Float(_) => VariableType::Float,
        }
    }
}

// Two values are equal when they have the same kind and the same bits.
// Floats compare by bit pattern, so NaN payloads round-trip as equal.
impl PartialEq for VariableValue {
    fn eq(&self, other: &VariableValue) -> bool {
        match (self, other) {
            (VariableValue::Bool(a), VariableValue::Bool(b)) => a == b,
            (VariableValue::Byte(a), VariableValue::Byte(b)) => a == b,
            (VariableValue::Word(a), VariableValue::Word(b)) => a == b,
            (VariableValue::DWord(a), VariableValue::DWord(b)) => a == b,
            (VariableValue::Float(a), VariableValue::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for VariableValue {}

impl fmt::Display for VariableValue {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            VariableValue::Bool(v) => write!(fmt, "{}:{}", v, self.var_type()),
            VariableValue::Byte(v) => write!(fmt, "{}:{}", v, self.var_type()),
            VariableValue::Word(v) => write!(fmt, "{}:{}", v, self.var_type()),
            VariableValue::DWord(v) => write!(fmt, "{}:{}", v, self.var_type()),
            VariableValue::Float(v) => write!(fmt, "{}:{}", v, self.var_type()),
        }
    }
}

impl Frame<VariableValue> for VariableValue {
    fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.var_type().to_u8());
        match *self {
            VariableValue::Bool(v) => buf.put_u8(if v { 1 } else { 0 }),
            VariableValue::Byte(v) => buf.put_u8(v),
            VariableValue::Word(v) => buf.put_u16(v),
            VariableValue::DWord(v) => buf.put_u32(v),
            VariableValue::Float(v) => buf.put_f32(v),
        }
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<VariableValue, DecodeError> {
        let value = match VariableType::from_u8(get_u8(src)?)? {
            VariableType::Bool => VariableValue::Bool(get_u8(src)? != 0),
            VariableType::Byte => VariableValue::Byte(get_u8(src)?),
            VariableType::Word => VariableValue::Word(get_u16(src)?),
            VariableType::DWord => VariableValue::DWord(get_u32(src)?),
            VariableType::Float => VariableValue::Float(get_f32(src)?),
        };
        Ok(value)
    }
}
