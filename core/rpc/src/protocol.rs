// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Protocol definition model
//!
//! A protocol maps message names to their request fields, response type,
//! declared error types and one-way flag. The dispatch core only reads it;
//! value type-checking against these shapes happens elsewhere.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use courier_config::component::configuration::{Configuration, ConfigurationError};
use courier_config::provider::{ConfigProvider, FileConfigProvider};

use crate::errors::ErrorType;

/// Type name a one-way message must use as its response
pub const NULL_TYPE: &str = "null";

/// A named, typed request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Descriptor of a declared error type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ErrorRepr")]
pub struct ErrorDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

// Declared errors may be written either as a bare type name or as a record.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorRepr {
    Name(String),
    Record {
        name: String,
        #[serde(default)]
        fields: Vec<Field>,
    },
}

impl From<ErrorRepr> for ErrorDescriptor {
    fn from(repr: ErrorRepr) -> Self {
        match repr {
            ErrorRepr::Name(name) => ErrorDescriptor {
                name,
                fields: Vec::new(),
            },
            ErrorRepr::Record { name, fields } => ErrorDescriptor { name, fields },
        }
    }
}

impl ErrorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        ErrorDescriptor {
            name: name.into(),
            fields: Vec::new(),
        }
    }
}

fn default_response() -> String {
    NULL_TYPE.to_string()
}

/// A single message of a protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    request: Vec<Field>,

    #[serde(default = "default_response")]
    response: String,

    #[serde(default)]
    errors: Vec<ErrorDescriptor>,

    #[serde(default, rename = "one-way", alias = "one_way")]
    one_way: bool,
}

impl Default for Message {
    fn default() -> Self {
        Message {
            request: Vec::new(),
            response: default_response(),
            errors: Vec::new(),
            one_way: false,
        }
    }
}

impl Message {
    pub fn new() -> Self {
        Message::default()
    }

    pub fn with_request(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.request.push(Field::new(name, ty));
        self
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        Message {
            response: response.into(),
            ..self
        }
    }

    /// Declare a typed error for this message
    pub fn with_error<E: ErrorType>(self) -> Self {
        self.with_error_name(E::NAME)
    }

    pub fn with_error_name(mut self, name: impl Into<String>) -> Self {
        self.errors.push(ErrorDescriptor::new(name));
        self
    }

    pub fn with_one_way(self, one_way: bool) -> Self {
        Message { one_way, ..self }
    }

    pub fn request(&self) -> &[Field] {
        &self.request
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn errors(&self) -> &[ErrorDescriptor] {
        &self.errors
    }

    pub fn is_one_way(&self) -> bool {
        self.one_way
    }

    /// Whether `type_name` is one of the declared errors of this message
    pub fn declares(&self, type_name: &str) -> bool {
        self.errors.iter().any(|e| e.name == type_name)
    }

    fn validate_named(&self, name: &str) -> Result<(), ConfigurationError> {
        if name.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "messages".to_string(),
                reason: "message name must not be empty".to_string(),
            });
        }

        if self.one_way && (self.response != NULL_TYPE || !self.errors.is_empty()) {
            return Err(ConfigurationError::InvalidValue {
                field: format!("messages.{}", name),
                reason: "one-way messages must respond null and declare no errors".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.request {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigurationError::InvalidValue {
                    field: format!("messages.{}.request", name),
                    reason: format!("duplicate field {}", field.name),
                });
            }
        }

        let mut seen = HashSet::new();
        for error in &self.errors {
            if !seen.insert(error.name.as_str()) {
                return Err(ConfigurationError::InvalidValue {
                    field: format!("messages.{}.errors", name),
                    reason: format!("duplicate error {}", error.name),
                });
            }
        }

        Ok(())
    }
}

/// Protocol definition: a named set of messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    #[serde(rename = "protocol")]
    name: String,

    #[serde(default)]
    messages: BTreeMap<String, Message>,
}

impl Protocol {
    pub fn new(name: impl Into<String>) -> Self {
        Protocol {
            name: name.into(),
            messages: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, name: impl Into<String>, message: Message) -> Self {
        self.messages.insert(name.into(), message);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.get(name)
    }

    pub fn messages(&self) -> impl Iterator<Item = (&str, &Message)> {
        self.messages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse and validate a protocol written in YAML (or JSON)
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigurationError> {
        let protocol: Protocol =
            serde_yaml::from_str(raw).map_err(|e| ConfigurationError::ParseError(e.to_string()))?;
        protocol.validate()?;
        Ok(protocol)
    }

    /// Load and validate a protocol from a file
    pub fn from_file(path: &str) -> Result<Self, ConfigurationError> {
        let protocol: Protocol = FileConfigProvider
            .load_yaml(path)
            .map_err(|e| ConfigurationError::ParseError(e.to_string()))?;
        protocol.validate()?;
        Ok(protocol)
    }
}

impl Configuration for Protocol {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "protocol".to_string(),
                reason: "protocol name must not be empty".to_string(),
            });
        }

        for (name, message) in &self.messages {
            message.validate_named(name)?;
        }

        Ok(())
    }
}
