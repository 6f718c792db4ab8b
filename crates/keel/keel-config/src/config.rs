use keel_latest::{ExchangeConfig, ExchangeError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KeelConfig {
    /// Slots in the editor → processor exchange.
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// How often the processor runs a block.
    #[serde(default = "defaults::block_period_us")]
    pub block_period_us: u64,
    /// How often the editor commits a new patch.
    #[serde(default = "defaults::edit_period_us")]
    pub edit_period_us: u64,
    #[serde(default = "defaults::run_for_ms")]
    pub run_for_ms: u64,
    #[serde(default = "defaults::report_every_ms")]
    pub report_every_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid exchange settings")]
    Exchange(#[from] ExchangeError),

    #[error("`{field}` must be greater than zero")]
    ZeroPeriod { field: &'static str },
}

mod defaults {
    pub fn capacity() -> usize {
        keel_latest::DEFAULT_CAPACITY
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn block_period_us() -> u64 {
        1_000
    }

    pub fn edit_period_us() -> u64 {
        5_000
    }

    pub fn run_for_ms() -> u64 {
        2_000
    }

    pub fn report_every_ms() -> u64 {
        500
    }
}

impl Default for KeelConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            log_level: defaults::log_level(),
            block_period_us: defaults::block_period_us(),
            edit_period_us: defaults::edit_period_us(),
            run_for_ms: defaults::run_for_ms(),
            report_every_ms: defaults::report_every_ms(),
        }
    }
}

impl KeelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_str)
    }

    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: KeelConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot: slot count and non-zero periods.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exchange_config()?;
        for (field, value) in [
            ("block_period_us", self.block_period_us),
            ("edit_period_us", self.edit_period_us),
            ("report_every_ms", self.report_every_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroPeriod { field });
            }
        }
        Ok(())
    }

    pub fn exchange_config(&self) -> Result<ExchangeConfig, ConfigError> {
        Ok(ExchangeConfig::new(self.capacity)?)
    }

    pub fn block_period(&self) -> Duration {
        Duration::from_micros(self.block_period_us)
    }

    pub fn edit_period(&self) -> Duration {
        Duration::from_micros(self.edit_period_us)
    }

    pub fn run_for(&self) -> Duration {
        Duration::from_millis(self.run_for_ms)
    }

    pub fn report_every(&self) -> Duration {
        Duration::from_millis(self.report_every_ms)
    }
}
