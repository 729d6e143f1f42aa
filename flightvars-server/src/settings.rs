use config::{Config, ConfigError, File};
use serde_derive::Deserialize;

/// Endpoint of an external MQTT broker carrying the offset bus.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
}

/// Server configuration, loaded from an optional file over built-in
/// defaults. Exported offsets use the `<hex address>:<length>` form.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub exports: Vec<String>,
    pub poll_interval_ms: u64,
    pub broker: Option<BrokerSettings>,
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Settings, ConfigError> {
        let mut cfg = Config::new();
        cfg.set_default("port", i64::from(flightvars_core::DEFAULT_PORT))?;
        cfg.set_default("exports", Vec::<String>::new())?;
        cfg.set_default("poll_interval_ms", 250i64)?;
        if let Some(path) = path {
            cfg.merge(File::with_name(path))?;
        }
        cfg.try_into()
    }
}
