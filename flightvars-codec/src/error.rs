use thiserror::Error;

/// An error found while decoding a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffered input ends in the middle of a message. The caller is
    /// expected to gather more bytes and retry; nothing was consumed.
    #[error("incomplete message, more bytes required")]
    Incomplete,

    /// The input violates the protocol.
    #[error("protocol error: expected {expected}, found {actual}")]
    Unexpected { expected: String, actual: String },
}

impl DecodeError {
    pub fn unexpected(expected: impl Into<String>, actual: impl Into<String>) -> DecodeError {
        DecodeError::Unexpected {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
