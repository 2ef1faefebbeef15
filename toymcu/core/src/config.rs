use crate::flipjump::FlipJumpConfig;
use crate::gmc4::Gmc4Config;
use nibble_vm::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_MAX_STEPS: u64 = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one run of any of the machines. Every field is optional in
/// the JSON file; command-line flags override what is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_steps: u64,
    pub tps: EngineConfig,
    pub flipjump: FlipJumpConfig,
    pub gmc4: Gmc4Config,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            tps: EngineConfig::default(),
            flipjump: FlipJumpConfig::default(),
            gmc4: Gmc4Config::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "loaded run config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tps.page_size == 0 {
            return Err(ConfigError::Invalid("tps.page_size must be non-zero".into()));
        }
        self.flipjump.validate()?;
        self.gmc4.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nibble_vm::ReturnConvention;

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(RunConfig::from_json("{}").unwrap(), RunConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = RunConfig::from_json(
            r#"{"max_steps": 12, "tps": {"return_convention": "link_plus_one"},
                "flipjump": {"word_bits": 16}}"#,
        )
        .unwrap();
        assert_eq!(config.max_steps, 12);
        assert_eq!(config.tps.return_convention, ReturnConvention::LinkPlusOne);
        assert_eq!(config.tps.page_size, 16);
        assert_eq!(config.flipjump.word_bits, 16);
        assert_eq!(config.flipjump.start_ip, 0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RunConfig::from_json(r#"{"flipjump": {"word_bits": 0}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"tps": {"page_size": 0}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_json("[1, 2]"),
            Err(ConfigError::Json(_))
        ));
    }
}
