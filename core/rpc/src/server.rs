// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server-side message dispatch
//!
//! Handlers are registered per message name. An incoming [`WireCall`] is
//! wrapped in the server middleware chain, the handler runs at its center,
//! and whatever it raises is classified against the declared errors of the
//! message before being turned into a [`WireReply`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::classifier::{ErrorEnvelope, classify};
use crate::client::Client;
use crate::context::{CallContext, Origin, Scope};
use crate::errors::{CallError, HandlerError};
use crate::message::{ReplyBody, WireCall, WireReply, WrappedRequest, WrappedResponse};
use crate::middleware::{Interceptor, Terminal, execute};
use crate::protocol::{Message, Protocol};
use crate::transport::LocalTransport;

/// Type-erased handler: decoded arguments in, result value out
pub type Handler =
    Arc<dyn Fn(Vec<Value>, Scope) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Observer of failures in one-way calls, which have no reply to carry them
pub type FailureHook = Arc<dyn Fn(&str, &ErrorEnvelope) + Send + Sync>;

struct ServerInner {
    protocol: Arc<Protocol>,
    handlers: RwLock<HashMap<String, Handler>>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
    one_way_failure: RwLock<Option<FailureHook>>,
}

/// Message dispatcher. Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("protocol", &self.inner.protocol.name())
            .field("handlers", &self.inner.handlers.read().len())
            .field("interceptors", &self.inner.interceptors.read().len())
            .finish()
    }
}

impl Server {
    pub fn new(protocol: impl Into<Arc<Protocol>>) -> Self {
        Server {
            inner: Arc::new(ServerInner {
                protocol: protocol.into(),
                handlers: RwLock::new(HashMap::new()),
                interceptors: RwLock::new(Vec::new()),
                one_way_failure: RwLock::new(None),
            }),
        }
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.inner.protocol
    }

    /// Whether both handles refer to the same server
    pub fn ptr_eq(&self, other: &Server) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append an interceptor to the server chain
    pub fn use_interceptor<I: Interceptor + 'static>(&self, interceptor: I) -> &Self {
        self.inner.interceptors.write().push(Arc::new(interceptor));
        self
    }

    /// Register a handler taking raw argument values.
    ///
    /// Registering again for the same message replaces the previous handler.
    pub fn on_message_raw<F, Fut>(&self, name: &str, handler: F) -> Result<&Self, CallError>
    where
        F: Fn(Vec<Value>, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        if self.inner.protocol.message(name).is_none() {
            return Err(CallError::UnknownMessage(name.to_string()));
        }

        let handler: Handler = Arc::new(
            move |args: Vec<Value>, scope: Scope| -> BoxFuture<'static, Result<Value, HandlerError>> {
                Box::pin(handler(args, scope))
            },
        );
        if self
            .inner
            .handlers
            .write()
            .insert(name.to_string(), handler)
            .is_some()
        {
            debug!(message = name, "replaced handler");
        } else {
            debug!(message = name, "registered handler");
        }

        Ok(self)
    }

    /// Register a typed handler.
    ///
    /// The argument list is decoded into `Req` (a tuple or a struct with one
    /// field per request field), and the returned `Res` is encoded back.
    pub fn on_message<Req, Res, F, Fut>(&self, name: &str, handler: F) -> Result<&Self, CallError>
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Req, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.on_message_raw(name, move |args: Vec<Value>, scope: Scope| {
            let handler = Arc::clone(&handler);
            async move {
                let request: Req = serde_json::from_value(Value::Array(args))?;
                let response = handler(request, scope).await?;
                Ok::<Value, HandlerError>(serde_json::to_value(response)?)
            }
        })
    }

    /// Install the hook notified when a one-way call fails
    pub fn on_one_way_failure<F>(&self, hook: F) -> &Self
    where
        F: Fn(&str, &ErrorEnvelope) + Send + Sync + 'static,
    {
        *self.inner.one_way_failure.write() = Some(Arc::new(hook));
        self
    }

    /// Client connected to this server through an in-process transport
    pub fn client(&self) -> Client {
        Client::new(
            self.inner.protocol.clone(),
            Arc::new(LocalTransport::new(self.clone())),
        )
    }

    /// Dispatch a decoded call.
    ///
    /// Returns the reply of a two-way call, `None` for a one-way call. Only
    /// a message missing from the protocol is an error; every failure past
    /// that point is carried by the reply.
    pub async fn dispatch(&self, call: WireCall) -> Result<Option<WireReply>, CallError> {
        let WireCall {
            message: name,
            args,
            headers,
        } = call;

        let Some(message) = self.inner.protocol.message(&name) else {
            warn!(message = %name, "dispatch of unknown message");
            return Err(CallError::UnknownMessage(name));
        };

        let handler = self.inner.handlers.read().get(&name).cloned();
        let Some(handler) = handler else {
            warn!(message = %name, "no handler registered");
            let envelope = fault_envelope(CallError::NoHandler(name.clone()), message);
            return Ok(self.reply(name, message, envelope));
        };

        let chain = self.inner.interceptors.read().clone();
        let context = Arc::new(CallContext::from_headers(headers));
        let scope = Scope::new(Origin::Server(self.clone()), context, &name);
        let mut req = WrappedRequest::new(scope, args);
        let terminal = HandlerTerminal { handler, message };

        if message.is_one_way() {
            if let Err(err) = execute(&chain, &terminal, &mut req, None).await {
                self.report_one_way_failure(&name, &fault_envelope(err, message));
            }
            return Ok(None);
        }

        let mut res = WrappedResponse::new(&name);
        if let Err(err) = execute(&chain, &terminal, &mut req, Some(&mut res)).await {
            warn!(message = %name, error = %err, "server chain failed");
            res.set_error(fault_envelope(err, message));
        }

        let body = res.into_body().unwrap_or(ReplyBody::Result(Value::Null));
        Ok(Some(WireReply {
            message: name,
            body,
        }))
    }

    fn reply(&self, name: String, message: &Message, envelope: ErrorEnvelope) -> Option<WireReply> {
        if message.is_one_way() {
            self.report_one_way_failure(&name, &envelope);
            return None;
        }

        Some(WireReply {
            message: name,
            body: ReplyBody::Error(envelope),
        })
    }

    fn report_one_way_failure(&self, name: &str, envelope: &ErrorEnvelope) {
        error!(message = name, error = ?envelope, "one-way call failed");

        let hook = self.inner.one_way_failure.read().clone();
        if let Some(hook) = hook {
            hook(name, envelope);
        }
    }
}

// An error that escaped the chain is an internal fault of the dispatch.
fn fault_envelope(err: CallError, message: &Message) -> ErrorEnvelope {
    classify(&HandlerError::from(err), message.errors())
}

struct HandlerTerminal<'a> {
    handler: Handler,
    message: &'a Message,
}

#[async_trait]
impl<'a> Terminal for HandlerTerminal<'a> {
    async fn call(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
    ) -> Result<(), CallError> {
        let outcome = (self.handler)(req.args().to_vec(), req.scope().clone()).await;

        match (outcome, res) {
            (Ok(value), Some(res)) => {
                res.set_result(value);
                Ok(())
            }
            (Ok(_), None) => Ok(()),
            (Err(thrown), res) => {
                let envelope = classify(&thrown, self.message.errors());
                debug!(
                    message = req.message(),
                    kind = %envelope.kind(),
                    "handler raised an error"
                );
                match res {
                    Some(res) => {
                        res.set_error(envelope);
                        Ok(())
                    }
                    None => Err(envelope.into_call_error(self.message)),
                }
            }
        }
    }
}
