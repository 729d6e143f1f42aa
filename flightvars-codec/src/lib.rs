pub mod begin_session;
pub mod end_session;
pub mod error;
pub mod message;
pub mod subscription;
pub mod unsubscription;
pub mod value;
pub mod var;
pub mod var_update;

pub use begin_session::BeginSession;
pub use end_session::EndSession;
pub use error::DecodeError;
pub use message::{Message, MessageType};
pub use subscription::{SubscriptionReply, SubscriptionRequest, SubscriptionStatus};
pub use unsubscription::{UnsubscriptionReply, UnsubscriptionRequest};
pub use value::{VariableType, VariableValue};
pub use var::{VariableGroup, VariableId, VariableName};
pub use var_update::VarUpdate;

use bytes::{Buf, BufMut};
use std::io::Cursor;

/// Conversion between a protocol code byte and its typed representation.
pub trait FromToU8<R> {
    fn to_u8(&self) -> u8;
    fn from_u8(byte: u8) -> Result<R, DecodeError>;
}

/// Payload encoding and decoding for one protocol message.
///
/// `to_buf` writes the message payload, without the type code or the
/// termination mark. `from_buf` reads it back from a cursor positioned
/// right after the type code.
pub trait Frame<R> {
    fn to_buf(&self, buf: &mut impl BufMut);
    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<R, DecodeError>;
}

pub(crate) fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, DecodeError> {
    if src.remaining() < 1 {
        return Err(DecodeError::Incomplete);
    }
    Ok(src.get_u8())
}

pub(crate) fn get_u16(src: &mut Cursor<&[u8]>) -> Result<u16, DecodeError> {
    if src.remaining() < 2 {
        return Err(DecodeError::Incomplete);
    }
    Ok(src.get_u16())
}

pub(crate) fn get_u32(src: &mut Cursor<&[u8]>) -> Result<u32, DecodeError> {
    if src.remaining() < 4 {
        return Err(DecodeError::Incomplete);
    }
    Ok(src.get_u32())
}

pub(crate) fn get_f32(src: &mut Cursor<&[u8]>) -> Result<f32, DecodeError> {
    if src.remaining() < 4 {
        return Err(DecodeError::Incomplete);
    }
    Ok(src.get_f32())
}

pub fn write_string(string: &str, buf: &mut impl BufMut) {
    assert!(
        string.len() <= 65535,
        "string length must be less than or equal 65535"
    );
    buf.put_u16(string.len() as u16);
    buf.put_slice(string.as_bytes());
}

pub fn read_string(src: &mut Cursor<&[u8]>) -> Result<String, DecodeError> {
    let len = get_u16(src)? as usize;
    if src.remaining() < len {
        return Err(DecodeError::Incomplete);
    }
    let pos = src.position() as usize;
    let bytes = src.get_ref()[pos..pos + len].to_vec();
    src.advance(len);
    String::from_utf8(bytes).map_err(|e| DecodeError::Unexpected {
        expected: "an UTF-8 encoded string".to_string(),
        actual: e.utf8_error().to_string(),
    })
}
