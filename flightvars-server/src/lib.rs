pub mod registry;
pub mod router;
pub mod server;
mod session;
pub mod settings;

pub use registry::{RegistryError, SubscriptionRegistry};
pub use router::Router;
pub use settings::Settings;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;
