mod connection;
pub use connection::Connection;
mod shutdown;
pub use shutdown::Shutdown;
pub mod api;

pub mod codec {
    pub use flightvars_codec::*;
}

/// Default TCP port the FlightVars server listens on.
pub const DEFAULT_PORT: u16 = 8642;

/// Protocol version transmitted in the session handshake, major in the
/// high byte and minor in the low byte.
pub const PROTOCOL_VERSION: u16 = 0x0100;

/// Peer name the server announces in its handshake reply.
pub const SERVER_PEER_NAME: &str = "FlightVars Server";

/// Two peers can talk iff the major half of their protocol versions match.
pub fn protocol_compatible(peer_ver: u16) -> bool {
    peer_ver >> 8 == PROTOCOL_VERSION >> 8
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;
