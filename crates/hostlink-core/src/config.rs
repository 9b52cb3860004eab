//! Centralized Configuration Management
//!
//! Every tunable of a hostlink runtime lives here, grouped by concern. All
//! sections deserialize with defaults so a config file only needs the keys it
//! changes.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{HostlinkError, HostlinkResult};
use crate::types::ClassId;

// ----------------------------------------------------------------------------
// Diagnostics Configuration
// ----------------------------------------------------------------------------

/// Configuration for the diagnostics pub/sub channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Class id the diagnostics methods are namespaced under
    pub class_id: ClassId,
    /// Polling interval announced for emitters created without one
    pub default_interval_frames: u32,
    /// Publish the runtime's own protocol counters as an emitter
    pub publish_protocol_stats: bool,
    /// Name of the protocol counters emitter
    pub protocol_emitter_name: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            class_id: 0x150,
            default_interval_frames: 30, // twice a second at 60 fps
            publish_protocol_stats: true,
            protocol_emitter_name: "hostlink.protocol".to_string(),
        }
    }
}

impl DiagnosticsConfig {
    /// Create configuration optimized for testing (poll every frame)
    pub fn testing() -> Self {
        Self {
            default_interval_frames: 1,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Configuration
// ----------------------------------------------------------------------------

/// Configuration for frame delivery between the two sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Frames buffered per direction by the in-memory channel transport
    pub channel_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 64,
        }
    }
}

impl TransportConfig {
    pub fn testing() -> Self {
        Self {
            channel_buffer_size: 8,
        }
    }
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Log levels for runtime output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Configuration for log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

// ----------------------------------------------------------------------------
// Top-level Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of one hostlink runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostlinkConfig {
    pub diagnostics: DiagnosticsConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

impl HostlinkConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            diagnostics: DiagnosticsConfig::testing(),
            transport: TransportConfig::testing(),
            logging: LoggingConfig {
                level: LogLevel::Debug,
            },
        }
    }

    /// Reject values no runtime can work with
    pub fn validate(&self) -> HostlinkResult<()> {
        if self.diagnostics.default_interval_frames == 0 {
            return Err(HostlinkError::config_error(
                "diagnostics.default_interval_frames must be at least 1",
            ));
        }
        if self.diagnostics.publish_protocol_stats
            && self.diagnostics.protocol_emitter_name.is_empty()
        {
            return Err(HostlinkError::config_error(
                "diagnostics.protocol_emitter_name must not be empty",
            ));
        }
        if self.transport.channel_buffer_size == 0 {
            return Err(HostlinkError::config_error(
                "transport.channel_buffer_size must be at least 1",
            ));
        }
        Ok(())
    }
}
