mod editor;
mod processor;

pub use editor::Editor;
pub use processor::{BlockReport, Processor, ProcessorStats};

use keel_config::{ConfigError, KeelConfig};
use keel_latest::{ExchangeConfig, bridge};
use keel_params::Patch;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid engine configuration")]
    Config(#[from] ConfigError),
}

/// Links an editor and a processor over a fresh exchange seeded with `initial`.
pub fn pair(config: ExchangeConfig, initial: Patch) -> (Editor, Processor) {
    let (producer, consumer) = bridge::owned(config, initial);
    (Editor::new(producer), Processor::new(consumer))
}

/// Same as [`pair`], taking the slot count from a loaded config.
pub fn from_config(config: &KeelConfig, initial: Patch) -> Result<(Editor, Processor), EngineError> {
    Ok(pair(config.exchange_config()?, initial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_a_linked_pair() {
        let config = KeelConfig::from_toml_str("capacity = 7").unwrap();
        let (editor, mut processor) = from_config(&config, Patch::default()).unwrap();
        assert!(!editor.is_dirty());
        assert!(processor.process_block().adopted);
    }

    #[test]
    fn from_config_rejects_hand_built_bad_capacity() {
        let config = KeelConfig {
            capacity: 1,
            ..KeelConfig::default()
        };
        let err = from_config(&config, Patch::default()).err().unwrap();
        assert!(matches!(err, EngineError::Config(ConfigError::Exchange(_))));
    }
}
