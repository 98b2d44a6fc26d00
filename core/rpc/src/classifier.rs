// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Error classification
//!
//! Errors are classified exactly once, where they leave a handler. Declared
//! errors are forwarded unchanged; everything else is reduced to its message
//! and optional discriminator code.

use serde::{Deserialize, Serialize};

use crate::errors::{ApplicationError, CallError, DeclaredError, ErrorKind, HandlerError};
use crate::protocol::{ErrorDescriptor, Message};

/// Error half of a reply, as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorEnvelope {
    Declared {
        error: DeclaredError,
    },
    Application {
        cause: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        application_code: Option<String>,
    },
}

impl ErrorEnvelope {
    pub fn application(cause: impl Into<String>, application_code: Option<String>) -> Self {
        ErrorEnvelope::Application {
            cause: cause.into(),
            application_code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorEnvelope::Declared { .. } => ErrorKind::Declared,
            ErrorEnvelope::Application { .. } => ErrorKind::Application,
        }
    }

    /// Turn a received envelope into the error surfaced to the caller.
    ///
    /// A declared error is only reconstructed when the local definition of
    /// `message` declares its type; otherwise it degrades to an application
    /// error.
    pub fn into_call_error(self, message: &Message) -> CallError {
        match self {
            ErrorEnvelope::Declared { error } if message.declares(error.type_name()) => {
                CallError::Declared(error)
            }
            ErrorEnvelope::Declared { error } => CallError::Application(ApplicationError::new(
                format!("undeclared error type {}", error.type_name()),
                None,
            )),
            ErrorEnvelope::Application {
                cause,
                application_code,
            } => CallError::Application(ApplicationError::new(cause, application_code)),
        }
    }
}

/// Classify an error raised by a handler against the declared errors of its
/// message.
pub fn classify(thrown: &HandlerError, declared: &[ErrorDescriptor]) -> ErrorEnvelope {
    match thrown {
        HandlerError::Declared(error) if declared.iter().any(|d| d.name == error.type_name()) => {
            ErrorEnvelope::Declared {
                error: error.clone(),
            }
        }
        other => ErrorEnvelope::application(other.to_string(), other.code().map(str::to_string)),
    }
}
