// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod file;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileConfigProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Source of raw configuration documents
pub trait ConfigProvider {
    fn load(&self, location: &str) -> Result<String, ProviderError>;

    /// Load a document and deserialize it as YAML (JSON is accepted too)
    fn load_yaml<T: DeserializeOwned>(&self, location: &str) -> Result<T, ProviderError> {
        let raw = self.load(location)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}
