mod config;
pub use config::{ConfigError, KeelConfig};
