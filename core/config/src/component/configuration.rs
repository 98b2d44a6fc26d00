// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("parse error: {0}")]
    ParseError(String),
}

pub trait Configuration {
    /// Validate the component configuration
    fn validate(&self) -> Result<(), ConfigurationError>;
}
