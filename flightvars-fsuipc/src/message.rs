use crate::offset::OffsetLength;
use byteorder::{ByteOrder, NativeEndian};
use bytes::Bytes;
use thiserror::Error;

/// Sender tag of messages originated by the sampler itself. Incoming
/// messages carrying it are loopback and must be ignored.
pub const SENDER_SELF: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid offset payload: expected {expected} bytes, found {actual}")]
pub struct InvalidPayload {
    pub expected: usize,
    pub actual: usize,
}

/// The payload of an offset bus message: `{u8 sender; u8 reserved; value}`
/// where the value width follows the offset length and the byte order is
/// the host's native one. The native order is a compatibility commitment
/// with the other processes on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetMessage {
    pub sender: u8,
    pub reserved: u8,
    pub value: u32,
}

impl OffsetMessage {
    /// A message originated by this process.
    pub fn own(value: u32) -> OffsetMessage {
        OffsetMessage {
            sender: SENDER_SELF,
            reserved: 0,
            value,
        }
    }

    pub fn encode(&self, length: OffsetLength) -> Bytes {
        let mut buf = vec![0u8; 2 + length.in_bytes()];
        buf[0] = self.sender;
        buf[1] = self.reserved;
        match length {
            OffsetLength::Byte => buf[2] = self.value as u8,
            OffsetLength::Word => NativeEndian::write_u16(&mut buf[2..], self.value as u16),
            OffsetLength::DWord => NativeEndian::write_u32(&mut buf[2..], self.value),
        }
        Bytes::from(buf)
    }

    pub fn decode(length: OffsetLength, payload: &[u8]) -> Result<OffsetMessage, InvalidPayload> {
        let expected = 2 + length.in_bytes();
        if payload.len() != expected {
            return Err(InvalidPayload {
                expected,
                actual: payload.len(),
            });
        }
        let value = match length {
            OffsetLength::Byte => payload[2] as u32,
            OffsetLength::Word => NativeEndian::read_u16(&payload[2..]) as u32,
            OffsetLength::DWord => NativeEndian::read_u32(&payload[2..]),
        };
        Ok(OffsetMessage {
            sender: payload[0],
            reserved: payload[1],
            value,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_width_roundtrips() {
        for &(length, value) in &[
            (OffsetLength::Byte, 0x42),
            (OffsetLength::Word, 0x1234),
            (OffsetLength::DWord, 0xdead_beef),
        ] {
            let message = OffsetMessage {
                sender: 1,
                reserved: 0,
                value,
            };
            let encoded = message.encode(length);
            assert_eq!(encoded.len(), 2 + length.in_bytes());
            assert_eq!(OffsetMessage::decode(length, &encoded).unwrap(), message);
        }
    }

    #[test]
    fn value_travels_in_host_byte_order() {
        let encoded = OffsetMessage::own(0x1234).encode(OffsetLength::Word);
        assert_eq!(&encoded[2..], &0x1234u16.to_ne_bytes()[..]);
    }

    #[test]
    fn wrong_payload_size_is_rejected() {
        let err = OffsetMessage::decode(OffsetLength::DWord, &[0, 0, 1]).unwrap_err();
        assert_eq!(err.expected, 6);
        assert_eq!(err.actual, 3);
    }
}
