use crate::error::DecodeError;
use crate::{get_u16, read_string, write_string, Frame};
use bytes::BufMut;
use std::io::Cursor;

/// Sent by the client when it initiates the session, and by the server as
/// response to that. It carries the peer name and the protocol version the
/// peer implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginSession {
    pub pname: String,
    pub proto_ver: u16,
}

impl BeginSession {
    pub fn new(pname: impl Into<String>, proto_ver: u16) -> BeginSession {
        BeginSession {
            pname: pname.into(),
            proto_ver,
        }
    }
}

impl Frame<BeginSession> for BeginSession {
    fn to_buf(&self, buf: &mut impl BufMut) {
        write_string(&self.pname, buf);
        buf.put_u16(self.proto_ver);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<BeginSession, DecodeError> {
        let pname = read_string(src)?;
        let proto_ver = get_u16(src)?;
        Ok(BeginSession { pname, proto_ver })
    }
}
