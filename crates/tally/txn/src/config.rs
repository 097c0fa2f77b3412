//! Lifecycle configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tally_types::{Stc, TokenCode, TokenType};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parameters of the transaction lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// The only token transaction fees may be paid in
    pub fee_token: TokenCode,

    /// Largest fee a single transaction may be charged
    pub max_fee: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            fee_token: Stc::token_code(),
            max_fee: u64::MAX,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text; missing keys take their defaults
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.fee_token.to_string(), "0x1::STC::STC");
        assert_eq!(config.max_fee, u64::MAX);
    }

    #[test]
    fn test_partial_toml() {
        let config = LifecycleConfig::from_toml("max_fee = 5000").unwrap();
        assert_eq!(config.max_fee, 5000);
        assert_eq!(config.fee_token, Stc::token_code());
    }

    #[test]
    fn test_fee_token_override() {
        let config = LifecycleConfig::from_toml(
            r#"
            fee_token = "0x2::Gas::GAS"
            max_fee = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.fee_token.to_string(), "0x2::Gas::GAS");
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            LifecycleConfig::from_toml("max_fee = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            LifecycleConfig::load("/nonexistent/tally/lifecycle.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
