//! Hostlink CLI Configuration
//!
//! The CLI reads a single TOML file. The runtime sections (`[diagnostics]`,
//! `[transport]`, `[logging]`) sit at the top level next to the CLI's own
//! `[replay]` section, and every key is optional.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use hostlink_core::HostlinkConfig;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the hostlink CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Runtime configuration used by `replay`
    #[serde(flatten)]
    pub hostlink: HostlinkConfig,

    /// Replay behavior
    pub replay: ReplayConfig,
}

/// Replay-specific options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// How long to wait for the runtime's reply to one frame
    pub tick_timeout_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_timeout_ms: 5_000,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Read, parse and validate a TOML configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let config = Self::from_toml_str(&text)?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.hostlink.validate()?;
        if self.replay.tick_timeout_ms == 0 {
            return Err(CliError::Config(
                "replay.tick_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_core::LogLevel;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [diagnostics]
            default_interval_frames = 1
            publish_protocol_stats = false

            [logging]
            level = "debug"

            [replay]
            tick_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.hostlink.diagnostics.default_interval_frames, 1);
        assert!(!config.hostlink.diagnostics.publish_protocol_stats);
        assert_eq!(config.hostlink.diagnostics.class_id, 0x150);
        assert_eq!(config.hostlink.logging.level, LogLevel::Debug);
        assert_eq!(config.replay.tick_timeout_ms, 250);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = AppConfig::from_toml_str("[transport]\nchannel_buffer_size = 0\n");
        assert!(matches!(result, Err(CliError::Hostlink(_))));

        let result = AppConfig::from_toml_str("[replay]\ntick_timeout_ms = 0\n");
        assert!(matches!(result, Err(CliError::Config(_))));

        let result = AppConfig::from_toml_str("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(CliError::TomlParsing(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load_from_file("/nonexistent/hostlink.toml");
        match result {
            Err(CliError::Config(message)) => assert!(message.contains("hostlink.toml")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
