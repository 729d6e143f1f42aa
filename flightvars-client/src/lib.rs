mod client;
pub mod db;
mod error;
mod requests;

pub use client::{ErrorHandler, FlightVarsClient, DEFAULT_REQUEST_TIMEOUT};
pub use db::{DbError, SubscriptionDb};
pub use error::ClientError;

pub mod codec {
    pub use flightvars_codec::*;
}
