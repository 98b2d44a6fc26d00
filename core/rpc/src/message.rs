// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::ErrorEnvelope;
use crate::context::{CallContext, Scope};

/// Request of a single call, owned by that call
#[derive(Debug)]
pub struct WrappedRequest {
    args: Vec<Value>,
    scope: Scope,
}

impl WrappedRequest {
    pub(crate) fn new(scope: Scope, args: Vec<Value>) -> Self {
        WrappedRequest { args, scope }
    }

    pub fn message(&self) -> &str {
        self.scope.message()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn context(&self) -> &Arc<CallContext> {
        self.scope.context()
    }
}

/// Outcome carried by a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyBody {
    Result(Value),
    Error(ErrorEnvelope),
}

/// Response of a two-way call.
///
/// Unsettled until a result or an error is set; setting one replaces the
/// other. It is finalized by [`WrappedResponse::into_body`].
#[derive(Debug)]
pub struct WrappedResponse {
    message: String,
    body: Option<ReplyBody>,
}

impl WrappedResponse {
    pub(crate) fn new(message: &str) -> Self {
        WrappedResponse {
            message: message.to_string(),
            body: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_result(&mut self, value: Value) {
        self.body = Some(ReplyBody::Result(value));
    }

    pub fn set_error(&mut self, envelope: ErrorEnvelope) {
        self.body = Some(ReplyBody::Error(envelope));
    }

    pub(crate) fn set_body(&mut self, body: ReplyBody) {
        self.body = Some(body);
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.body {
            Some(ReplyBody::Result(value)) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match &self.body {
            Some(ReplyBody::Error(envelope)) => Some(envelope),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.body.is_some()
    }

    pub fn into_body(self) -> Option<ReplyBody> {
        self.body
    }
}

/// Call as handed to a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCall {
    pub message: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Reply to a two-way call as handed back by a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReply {
    pub message: String,
    pub body: ReplyBody,
}
