use crate::error::DecodeError;
use crate::subscription::SubscriptionStatus;
use crate::{get_u32, get_u8, read_string, write_string, Frame, FromToU8};
use bytes::BufMut;
use std::io::Cursor;

/// Sent by the client to drop the subscription with the given identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscriptionRequest {
    pub subs_id: u32,
}

impl UnsubscriptionRequest {
    pub fn new(subs_id: u32) -> UnsubscriptionRequest {
        UnsubscriptionRequest { subs_id }
    }
}

impl Frame<UnsubscriptionRequest> for UnsubscriptionRequest {
    fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.subs_id);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<UnsubscriptionRequest, DecodeError> {
        let subs_id = get_u32(src)?;
        Ok(UnsubscriptionRequest { subs_id })
    }
}

/// Sent by the server as response to an [`UnsubscriptionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscriptionReply {
    pub status: SubscriptionStatus,
    pub subs_id: u32,
    pub cause: String,
}

impl Frame<UnsubscriptionReply> for UnsubscriptionReply {
    fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.status.to_u8());
        buf.put_u32(self.subs_id);
        write_string(&self.cause, buf);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<UnsubscriptionReply, DecodeError> {
        let status = SubscriptionStatus::from_u8(get_u8(src)?)?;
        let subs_id = get_u32(src)?;
        let cause = read_string(src)?;
        Ok(UnsubscriptionReply {
            status,
            subs_id,
            cause,
        })
    }
}
