use crate::begin_session::BeginSession;
use crate::end_session::EndSession;
use crate::error::DecodeError;
use crate::subscription::{SubscriptionReply, SubscriptionRequest};
use crate::unsubscription::{UnsubscriptionReply, UnsubscriptionRequest};
use crate::var_update::VarUpdate;
use crate::{get_u16, Frame};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

/// Every message ends with this mark, big endian on the wire.
pub const MSG_TERMINATOR: u16 = 0x0d0a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// 0x700, two-way, session handshake
    BeginSession,
    /// 0x701, two-way, session teardown notification
    EndSession,
    /// 0x702, client to server, subscription request
    SubscriptionReq,
    /// 0x703, server to client, subscription acknowledgement
    SubscriptionRep,
    /// 0x704, client to server, unsubscription request
    UnsubscriptionReq,
    /// 0x705, server to client, unsubscription acknowledgement
    UnsubscriptionRep,
    /// 0x706, two-way, variable value update
    VarUpdate,
}

impl MessageType {
    pub fn to_u16(&self) -> u16 {
        match *self {
            MessageType::BeginSession => 0x700,
            MessageType::EndSession => 0x701,
            MessageType::SubscriptionReq => 0x702,
            MessageType::SubscriptionRep => 0x703,
            MessageType::UnsubscriptionReq => 0x704,
            MessageType::UnsubscriptionRep => 0x705,
            MessageType::VarUpdate => 0x706,
        }
    }

    pub fn from_u16(code: u16) -> Result<MessageType, DecodeError> {
        match code {
            0x700 => Ok(MessageType::BeginSession),
            0x701 => Ok(MessageType::EndSession),
            0x702 => Ok(MessageType::SubscriptionReq),
            0x703 => Ok(MessageType::SubscriptionRep),
            0x704 => Ok(MessageType::UnsubscriptionReq),
            0x705 => Ok(MessageType::UnsubscriptionRep),
            0x706 => Ok(MessageType::VarUpdate),
            n => Err(DecodeError::unexpected(
                "a message type code in range 0x700..=0x706",
                format!("code 0x{:x}", n),
            )),
        }
    }
}

/// A protocol message of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    BeginSession(BeginSession),
    EndSession(EndSession),
    SubscriptionRequest(SubscriptionRequest),
    SubscriptionReply(SubscriptionReply),
    UnsubscriptionRequest(UnsubscriptionRequest),
    UnsubscriptionReply(UnsubscriptionReply),
    VarUpdate(VarUpdate),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match *self {
            Message::BeginSession(_) => MessageType::BeginSession,
            Message::EndSession(_) => MessageType::EndSession,
            Message::SubscriptionRequest(_) => MessageType::SubscriptionReq,
            Message::SubscriptionReply(_) => MessageType::SubscriptionRep,
            Message::UnsubscriptionRequest(_) => MessageType::UnsubscriptionReq,
            Message::UnsubscriptionReply(_) => MessageType::UnsubscriptionRep,
            Message::VarUpdate(_) => MessageType::VarUpdate,
        }
    }

    /// Serialize this message, framing included, into the given buffer.
    pub fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.message_type().to_u16());
        match self {
            Message::BeginSession(msg) => msg.to_buf(buf),
            Message::EndSession(msg) => msg.to_buf(buf),
            Message::SubscriptionRequest(msg) => msg.to_buf(buf),
            Message::SubscriptionReply(msg) => msg.to_buf(buf),
            Message::UnsubscriptionRequest(msg) => msg.to_buf(buf),
            Message::UnsubscriptionReply(msg) => msg.to_buf(buf),
            Message::VarUpdate(msg) => msg.to_buf(buf),
        }
        buf.put_u16(MSG_TERMINATOR);
    }

    /// Parse one message from the front of the buffer.
    ///
    /// On success exactly the bytes of that message are consumed. On
    /// [`DecodeError::Incomplete`] the buffer is left untouched so the
    /// caller can read more input and retry.
    pub fn parse(buf: &mut BytesMut) -> Result<Message, DecodeError> {
        let mut cursor = Cursor::new(&buf[..]);
        let message = Message::from_cursor(&mut cursor)?;
        let len = cursor.position() as usize;
        buf.advance(len);
        Ok(message)
    }

    fn from_cursor(src: &mut Cursor<&[u8]>) -> Result<Message, DecodeError> {
        let message = match MessageType::from_u16(get_u16(src)?)? {
            MessageType::BeginSession => Message::BeginSession(BeginSession::from_buf(src)?),
            MessageType::EndSession => Message::EndSession(EndSession::from_buf(src)?),
            MessageType::SubscriptionReq => {
                Message::SubscriptionRequest(SubscriptionRequest::from_buf(src)?)
            }
            MessageType::SubscriptionRep => {
                Message::SubscriptionReply(SubscriptionReply::from_buf(src)?)
            }
            MessageType::UnsubscriptionReq => {
                Message::UnsubscriptionRequest(UnsubscriptionRequest::from_buf(src)?)
            }
            MessageType::UnsubscriptionRep => {
                Message::UnsubscriptionReply(UnsubscriptionReply::from_buf(src)?)
            }
            MessageType::VarUpdate => Message::VarUpdate(VarUpdate::from_buf(src)?),
        };
        let mark = get_u16(src)?;
        if mark != MSG_TERMINATOR {
            return Err(DecodeError::unexpected(
                "a message termination mark 0x0D0A",
                format!("bytes 0x{:04x}", mark),
            ));
        }
        Ok(message)
    }
}
