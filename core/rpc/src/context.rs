// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call context and call-scoped bindings
//!
//! A [`CallContext`] is created once per emitted call and shared by `Arc`
//! through every interceptor and into the handler. The deadline and the
//! correlation id live in the metadata so that they travel in the wire
//! headers and the receiving side can rebuild an equivalent context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::client::Client;
use crate::server::Server;

/// Metadata key holding the deadline, in seconds since the UNIX epoch
pub const DEADLINE_KEY: &str = "courier-deadline";

/// Metadata key holding the correlation id of the call
pub const CORRELATION_KEY: &str = "courier-correlation-id";

/// Call-scoped metadata
#[derive(Debug)]
pub struct CallContext {
    id: String,
    metadata: RwLock<HashMap<String, String>>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// Create an empty context with a fresh correlation id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    fn with_id(id: String) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(CORRELATION_KEY.to_string(), id.clone());
        CallContext {
            id,
            metadata: RwLock::new(metadata),
        }
    }

    /// Rebuild a context from wire headers
    pub fn from_headers(headers: HashMap<String, String>) -> Self {
        let id = headers
            .get(CORRELATION_KEY)
            .cloned()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ctx = Self::with_id(id);
        {
            let mut metadata = ctx.metadata.write();
            for (k, v) in headers {
                metadata.entry(k).or_insert(v);
            }
        }
        ctx
    }

    pub fn with_metadata(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_deadline(self, deadline: SystemTime) -> Self {
        let seconds = deadline
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.with_metadata(DEADLINE_KEY, seconds.to_string())
    }

    /// Set the deadline `timeout` from now; a timeout too large to represent
    /// leaves the call without a deadline
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match SystemTime::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Correlation id of the call
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.metadata.read().get(key).cloned()
    }

    /// Attach a value; returns the previous one
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.metadata.write().insert(key.into(), value.into())
    }

    /// Snapshot of the metadata, suitable for wire headers
    pub fn to_headers(&self) -> HashMap<String, String> {
        self.metadata.read().clone()
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.get(DEADLINE_KEY).and_then(|raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .and_then(|d| SystemTime::UNIX_EPOCH.checked_add(d))
        })
    }

    /// Time left before the deadline; zero once it has passed
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline().map(|deadline| {
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.deadline()
            .map(|deadline| SystemTime::now() > deadline)
            .unwrap_or(false)
    }
}

/// Instance handling the current call
#[derive(Debug, Clone)]
pub enum Origin {
    Client(Client),
    Server(Server),
}

/// Binding visible to interceptors and handlers for the duration of one call
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Origin,
    context: Arc<CallContext>,
    message: String,
}

impl Scope {
    pub(crate) fn new(origin: Origin, context: Arc<CallContext>, message: &str) -> Self {
        Scope {
            origin,
            context,
            message: message.to_string(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn client(&self) -> Option<&Client> {
        match &self.origin {
            Origin::Client(client) => Some(client),
            Origin::Server(_) => None,
        }
    }

    pub fn server(&self) -> Option<&Server> {
        match &self.origin {
            Origin::Server(server) => Some(server),
            Origin::Client(_) => None,
        }
    }

    pub fn context(&self) -> &Arc<CallContext> {
        &self.context
    }

    /// Name of the message being handled
    pub fn message(&self) -> &str {
        &self.message
    }
}
