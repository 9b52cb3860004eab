//! Runtime Builder API
//!
//! Collects the configuration, the feature classes' dispatch tables and their
//! state, then freezes them into a [`HostRuntime`].

use hostlink_core::{DispatchTable, HostlinkConfig, HostlinkResult, LogLevel};
use std::any::Any;
use tracing::info;

use crate::logging::init_logging;
use crate::runtime::HostRuntime;
use crate::state::RuntimeState;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

type ExtensionInstaller = Box<dyn FnOnce(&mut RuntimeState) + Send>;

/// Builder for a [`HostRuntime`]
pub struct RuntimeBuilder {
    config: HostlinkConfig,
    tables: Vec<DispatchTable<RuntimeState>>,
    extensions: Vec<ExtensionInstaller>,
    log_level: Option<LogLevel>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    /// Create a new runtime builder with default configuration and no logging
    pub fn new() -> Self {
        Self {
            config: HostlinkConfig::default(),
            tables: Vec::new(),
            extensions: Vec::new(),
            log_level: None,
        }
    }

    /// Set the hostlink configuration
    pub fn with_config(mut self, config: HostlinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Add the dispatch table of one feature class
    pub fn register_class(mut self, table: DispatchTable<RuntimeState>) -> Self {
        self.tables.push(table);
        self
    }

    /// Add per-class state reachable from handlers through [`RuntimeState::extension_mut`]
    pub fn with_extension<T: Any + Send>(mut self, value: T) -> Self {
        self.extensions.push(Box::new(move |state: &mut RuntimeState| {
            state.insert_extension(value);
        }));
        self
    }

    /// Configure console logging
    pub fn with_console_logging(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Use the level from the configuration's logging section
    pub fn with_configured_logging(mut self) -> Self {
        self.log_level = Some(self.config.logging.level);
        self
    }

    /// Disable logging
    pub fn with_no_logging(mut self) -> Self {
        self.log_level = None;
        self
    }

    /// Validate the configuration and build the runtime
    pub fn build(self) -> HostlinkResult<HostRuntime> {
        self.config.validate()?;

        if let Some(level) = self.log_level {
            init_logging(level);
        }
        info!(
            classes = self.tables.len(),
            diagnostics_class = self.config.diagnostics.class_id,
            "Building hostlink runtime"
        );

        let mut state = RuntimeState::new(&self.config.diagnostics);
        for install in self.extensions {
            install(&mut state);
        }
        HostRuntime::new(self.config, self.tables, state)
    }
}
