use crate::error::DecodeError;
use crate::{read_string, write_string, Frame};
use bytes::BufMut;
use std::io::Cursor;

/// Sent by either peer when it wants to close the session. The cause field
/// indicates why the session is being ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndSession {
    pub cause: String,
}

impl EndSession {
    pub fn new(cause: impl Into<String>) -> EndSession {
        EndSession {
            cause: cause.into(),
        }
    }
}

impl Frame<EndSession> for EndSession {
    fn to_buf(&self, buf: &mut impl BufMut) {
        write_string(&self.cause, buf);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<EndSession, DecodeError> {
        let cause = read_string(src)?;
        Ok(EndSession { cause })
    }
}
