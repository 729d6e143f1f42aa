pub mod adapter;
pub mod buffer;
pub mod domain;
pub mod message;
pub mod offset;

pub use adapter::{AdapterError, DummyOffsetAdapter, OffsetAdapter};
pub use buffer::DoubleBuffer;
pub use domain::{DomainSettings, OffsetDomain};
pub use message::OffsetMessage;
pub use offset::{Offset, OffsetAddress, OffsetLength, ValuedOffset};

/// The variable group served by the FSUIPC offsets domain.
pub const OFFSETS_GROUP: &str = "fsuipc/offset";

/// Prefix of the bus topics carrying offset values.
pub const OFFSETS_TOPIC_PREFIX: &str = "fsuipc/offsets";
