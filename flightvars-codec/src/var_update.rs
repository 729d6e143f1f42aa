use crate::error::DecodeError;
use crate::value::VariableValue;
use crate::{get_u32, Frame};
use bytes::BufMut;
use std::io::Cursor;

/// Carries a new value for a subscribed variable. Sent by the server to
/// notify a change, and by the client to request a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarUpdate {
    pub subs_id: u32,
    pub value: VariableValue,
}

impl VarUpdate {
    pub fn new(subs_id: u32, value: VariableValue) -> VarUpdate {
        VarUpdate { subs_id, value }
    }
}

impl Frame<VarUpdate> for VarUpdate {
    fn to_buf(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.subs_id);
        self.value.to_buf(buf);
    }

    fn from_buf(src: &mut Cursor<&[u8]>) -> Result<VarUpdate, DecodeError> {
        let subs_id = get_u32(src)?;
        let value = VariableValue::from_buf(src)?;
        Ok(VarUpdate { subs_id, value })
    }
}
