// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Description attached to every application error
pub const APPLICATION_ERROR_DESCRIPTION: &str = "remote handler raised an undeclared error";

/// A Rust type that can be listed as a declared error of a message.
///
/// `NAME` is the type identifier used in the protocol definition and on the
/// wire; the payload is carried as its serde representation.
pub trait ErrorType: Serialize + DeserializeOwned {
    const NAME: &'static str;
}

/// Error taxonomy of the dispatch core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownMessage,
    InvalidArguments,
    NoHandler,
    Declared,
    Application,
    Transport,
    DeadlineExceeded,
    Interceptor,
}

impl ErrorKind {
    /// Stable code of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownMessage => "ERR_UNKNOWN_MESSAGE",
            ErrorKind::InvalidArguments => "ERR_INVALID_ARGUMENTS",
            ErrorKind::NoHandler => "ERR_NO_HANDLER",
            ErrorKind::Declared => "ERR_DECLARED",
            ErrorKind::Application => "ERR_APPLICATION",
            ErrorKind::Transport => "ERR_TRANSPORT",
            ErrorKind::DeadlineExceeded => "ERR_DEADLINE_EXCEEDED",
            ErrorKind::Interceptor => "ERR_INTERCEPTOR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An instance of a declared error type, keyed by its type identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{type_name}: {payload}")]
pub struct DeclaredError {
    type_name: String,
    payload: Value,
}

impl DeclaredError {
    pub fn new<E: ErrorType>(err: &E) -> Result<Self, serde_json::Error> {
        Ok(DeclaredError {
            type_name: E::NAME.to_string(),
            payload: serde_json::to_value(err)?,
        })
    }

    pub fn from_parts(type_name: impl Into<String>, payload: Value) -> Self {
        DeclaredError {
            type_name: type_name.into(),
            payload,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn is<E: ErrorType>(&self) -> bool {
        self.type_name == E::NAME
    }

    /// Rebuild the typed error, if this instance is of type `E`
    pub fn downcast<E: ErrorType>(&self) -> Option<E> {
        if !self.is::<E>() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Original error of a remote application failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Cause {
    message: String,
}

impl Cause {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Generic wrapper for errors a remote handler raised without declaring them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", APPLICATION_ERROR_DESCRIPTION, .cause)]
pub struct ApplicationError {
    #[source]
    cause: Cause,
    application_code: Option<String>,
}

impl ApplicationError {
    pub fn new(cause: impl Into<String>, application_code: Option<String>) -> Self {
        ApplicationError {
            cause: Cause {
                message: cause.into(),
            },
            application_code,
        }
    }

    /// Fixed taxonomy code
    pub fn code(&self) -> &'static str {
        ErrorKind::Application.as_str()
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Discriminator code carried by the original error, if any
    pub fn application_code(&self) -> Option<&str> {
        self.application_code.as_deref()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("call rejected by peer: {0}")]
    Rejected(String),
    #[error("peer dropped the call: {0}")]
    Dropped(String),
}

/// Failure of a single call, as seen by the caller or by an interceptor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("invalid arguments for {message}: {reason}")]
    InvalidArguments { message: String, reason: String },
    #[error("no handler registered for message: {0}")]
    NoHandler(String),
    #[error("declared error {0}")]
    Declared(DeclaredError),
    #[error(transparent)]
    Application(ApplicationError),
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("interceptor failure: {0}")]
    Interceptor(String),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::UnknownMessage(_) => ErrorKind::UnknownMessage,
            CallError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            CallError::NoHandler(_) => ErrorKind::NoHandler,
            CallError::Declared(_) => ErrorKind::Declared,
            CallError::Application(_) => ErrorKind::Application,
            CallError::Transport(_) => ErrorKind::Transport,
            CallError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            CallError::Interceptor(_) => ErrorKind::Interceptor,
        }
    }

    pub fn as_declared(&self) -> Option<&DeclaredError> {
        match self {
            CallError::Declared(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_application(&self) -> Option<&ApplicationError> {
        match self {
            CallError::Application(err) => Some(err),
            _ => None,
        }
    }
}

/// Error raised by a handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error(transparent)]
    Declared(DeclaredError),
    #[error("{message}")]
    Fault {
        message: String,
        code: Option<String>,
    },
}

impl HandlerError {
    /// Raise an instance of a declared error type
    pub fn declared<E: ErrorType>(err: E) -> Self {
        match DeclaredError::new(&err) {
            Ok(declared) => HandlerError::Declared(declared),
            Err(e) => HandlerError::fault(format!("cannot encode {}: {}", E::NAME, e)),
        }
    }

    /// Raise an undeclared failure
    pub fn fault(message: impl Into<String>) -> Self {
        HandlerError::Fault {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a discriminator code; has no effect on declared errors
    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            HandlerError::Fault { message, .. } => HandlerError::Fault {
                message,
                code: Some(code.into()),
            },
            declared => declared,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            HandlerError::Fault { code, .. } => code.as_deref(),
            HandlerError::Declared(_) => None,
        }
    }
}

impl From<CallError> for HandlerError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Declared(declared) => HandlerError::Declared(declared),
            CallError::Application(app) => HandlerError::Fault {
                message: app.cause().message().to_string(),
                code: app.application_code.clone(),
            },
            other => HandlerError::fault(other.to_string()).with_code(other.kind().as_str()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::fault(err.to_string()).with_code(ErrorKind::InvalidArguments.as_str())
    }
}
