use crate::error::DecodeError;
use crate::var::{VariableGroup, VariableName};
use crate::{get_u32, get_u8, read_string, write_string, Frame, FromToU8};
use bytes::BufMut;
use core::fmt;
use std::io::Cursor;

/// The outcome of a subscription or unsubscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// 0, the subscription was accepted
    Subscribed,
    /// 1, the unsubscription was accepted
    Unsubscribed,
    /// 2, the requested variable is unknown to the server
    NoSuchVar,
    /// 3, the requested subscription is unknown to the server
    NoSuchSubscription,
    /// 4, a server error prevented the request from succeeding
    ServerError,
}

impl FromToU8<SubscriptionStatus> for SubscriptionStatus {
    fn to_u8(&self) -> u8 {
        match *self {
            SubscriptionStatus::Subscribed => 0,
            SubscriptionStatus::Unsubscribed => 1,
            SubscriptionStatus::NoSuchVar => 2,
            SubscriptionStatus::NoSuchSubscription => 3,
            SubscriptionStatus::ServerError => 4,
        }
    }

    fn from_u8(byte: u8) -> Result<SubscriptionStatus, DecodeError> {
        match byte {
            0 => Ok(SubscriptionStatus::Subscribed),
            1 => Ok(SubscriptionStatus::Unsubscribed),
            2 => Ok(SubscriptionStatus::NoSuchVar),
            3 => Ok(SubscriptionStatus::NoSuchSubscription),
            4 => Ok(SubscriptionStatus::ServerError),
            n => Err(DecodeError::unexpected(
                "a subscription status code in range 0..=4",
                format!("code {}", n),
            )),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SubscriptionStatus::Subscribed => "subscribed".fmt(fmt),
            SubscriptionStatus::Unsubscribed => "unsubscribed".fmt(fmt),
            SubscriptionStatus::NoSuchVar => "no such variable".fmt(fmt),
            SubscriptionStatus::NoSuchSubscription => "no such subscription".fmt(fmt),
            SubscriptionStatus::ServerError => "server error".fmt(fmt),
        }
    }
}

/// Sent by the client to request a new subscription for a variable. The
/// server responds with a [`SubscriptionReply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub var_grp: VariableGroup,
    pub var_name: VariableName,
}

impl SubscriptionRequest {
    pub fn new(var_grp: VariableGroup, var_name: VariableName) -> SubscriptionRequest {
        SubscriptionRequest { var_grp, var_name }
    }
}

impl Frame<SubscriptionRequest> for SubscriptionRequest {
    fn to_buf(&self, buf: &mut impl BufMut) {
        write_string(self.var_grp.as_str(), buf);
        write_string(self.var_name.as_str(), buf);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<SubscriptionRequest, DecodeError> {
        let var_grp = VariableGroup::new(read_string(src)?);
        let var_name = VariableName::new(read_string(src)?);
        Ok(SubscriptionRequest { var_grp, var_name })
    }
}

/// Sent by the server as response to a [`SubscriptionRequest`]. On success
/// it carries the server-assigned subscription identifier; on failure the
/// identifier is zero and the cause describes the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReply {
    pub status: SubscriptionStatus,
    pub var_grp: VariableGroup,
    pub var_name: VariableName,
    pub subs_id: u32,
    pub cause: String,
}

impl Frame<SubscriptionReply> for SubscriptionReply {
    fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.status.to_u8());
        write_string(self.var_grp.as_str(), buf);
        write_string(self.var_name.as_str(), buf);
        buf.put_u32(self.subs_id);
        write_string(&self.cause, buf);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<SubscriptionReply, DecodeError> {
        let status = SubscriptionStatus::from_u8(get_u8(src)?)?;
        let var_grp = VariableGroup::new(read_string(src)?);
        let var_name = VariableName::new(read_string(src)?);
        let subs_id = get_u32(src)?;
        let cause = read_string(src)?;
        Ok(SubscriptionReply {
            status,
            var_grp,
            var_name,
            subs_id,
            cause,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_status_code_is_rejected() {
        match SubscriptionStatus::from_u8(7) {
            Err(DecodeError::Unexpected { .. }) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }
}
