// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Logging setup for processes embedding the courier dispatch core.
//!
//! The dispatch crates only emit `tracing` events. A process that wants them
//! printed loads a [`TracingConfiguration`] and installs the global subscriber
//! once at startup.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use courier_config::component::configuration::{Configuration, ConfigurationError};
use courier_config::provider::{ConfigProvider, FileConfigProvider};

#[derive(Error, Debug)]
pub enum TracingError {
    #[error("invalid tracing configuration: {0}")]
    Config(#[from] ConfigurationError),
    #[error("cannot install subscriber: {0}")]
    Init(#[from] TryInitError),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TracingConfiguration {
    /// Level applied to every target not matched by `filter`
    #[serde(default = "default_log_level")]
    log_level: String,

    /// Extra directives in `EnvFilter` syntax, e.g. `courier_rpc=debug`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,

    #[serde(default = "default_display_thread_names")]
    display_thread_names: bool,

    #[serde(default)]
    display_thread_ids: bool,

    #[serde(default = "default_display_target")]
    display_target: bool,
}

impl Default for TracingConfiguration {
    fn default() -> Self {
        TracingConfiguration {
            log_level: default_log_level(),
            filter: None,
            display_thread_names: default_display_thread_names(),
            display_thread_ids: false,
            display_target: default_display_target(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_display_thread_names() -> bool {
    true
}

fn default_display_target() -> bool {
    true
}

impl TracingConfiguration {
    /// Load and validate a configuration file
    pub fn from_file(path: &str) -> Result<Self, TracingError> {
        let config: TracingConfiguration = FileConfigProvider
            .load_yaml(path)
            .map_err(|e| ConfigurationError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_log_level(self, log_level: impl Into<String>) -> Self {
        TracingConfiguration {
            log_level: log_level.into(),
            ..self
        }
    }

    pub fn with_filter(self, filter: impl Into<String>) -> Self {
        TracingConfiguration {
            filter: Some(filter.into()),
            ..self
        }
    }

    pub fn with_display_thread_names(self, display_thread_names: bool) -> Self {
        TracingConfiguration {
            display_thread_names,
            ..self
        }
    }

    pub fn with_display_thread_ids(self, display_thread_ids: bool) -> Self {
        TracingConfiguration {
            display_thread_ids,
            ..self
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn display_thread_names(&self) -> bool {
        self.display_thread_names
    }

    pub fn display_thread_ids(&self) -> bool {
        self.display_thread_ids
    }

    fn level(&self) -> Result<Level, ConfigurationError> {
        Level::from_str(&self.log_level).map_err(|_| ConfigurationError::InvalidValue {
            field: "log_level".to_string(),
            reason: format!("unknown level {}", self.log_level),
        })
    }

    /// Filter made of the `log_level` default plus the `filter` directives
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigurationError> {
        let level = self.level()?;
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(level).into())
            .parse(self.filter.as_deref().unwrap_or_default())
            .map_err(|e| ConfigurationError::InvalidValue {
                field: "filter".to_string(),
                reason: e.to_string(),
            })
    }

    /// Install the global fmt subscriber.
    ///
    /// Fails if the configuration is invalid or a global subscriber is
    /// already installed.
    pub fn setup_tracing_subscriber(&self) -> Result<(), TracingError> {
        let filter = self.env_filter()?;

        tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_thread_names(self.display_thread_names)
            .with_thread_ids(self.display_thread_ids)
            .with_target(self.display_target)
            .finish()
            .try_init()?;

        tracing::debug!(log_level = %self.log_level, filter = ?self.filter, "tracing initialized");
        Ok(())
    }
}

impl Configuration for TracingConfiguration {
    fn validate(&self) -> Result<(), ConfigurationError> {
        self.env_filter().map(|_| ())
    }
}
