// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side call emission
//!
//! [`Client::emit_message`] binds a [`CallContext`] to a call and returns an
//! [`Emitter`]. Calling a message on it runs the client middleware chain
//! around the transport send and surfaces the reply, or its error, to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::component::configuration::{Configuration, ConfigurationError};
use duration_str::deserialize_option_duration;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::{CallContext, Origin, Scope};
use crate::errors::{CallError, TransportError};
use crate::interceptor::Timeout;
use crate::message::{ReplyBody, WireCall, WrappedRequest, WrappedResponse};
use crate::middleware::{Interceptor, Terminal, execute};
use crate::protocol::Protocol;
use crate::transport::Transport;

/// Client settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Upper bound on every call, e.g. "5s" or "250ms"
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub default_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn with_default_timeout(self, timeout: Duration) -> Self {
        ClientConfig {
            default_timeout: Some(timeout),
        }
    }
}

impl Configuration for ClientConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigurationError::InvalidValue {
                field: "default_timeout".to_string(),
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

struct ClientInner {
    protocol: Arc<Protocol>,
    transport: Arc<dyn Transport>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
}

/// Call emitter bound to a protocol and a transport.
/// Cloning yields another handle to the same client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("protocol", &self.inner.protocol.name())
            .field("interceptors", &self.inner.interceptors.read().len())
            .finish()
    }
}

impl Client {
    pub fn new(protocol: impl Into<Arc<Protocol>>, transport: Arc<dyn Transport>) -> Self {
        Client {
            inner: Arc::new(ClientInner {
                protocol: protocol.into(),
                transport,
                interceptors: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Create a client and apply `config`.
    ///
    /// A default timeout installs a [`Timeout`] interceptor as the outermost
    /// frame of the chain.
    pub fn with_config(
        protocol: impl Into<Arc<Protocol>>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let client = Client::new(protocol, transport);
        if let Some(timeout) = config.default_timeout {
            client.use_interceptor(Timeout::new(timeout));
        }
        Ok(client)
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.inner.protocol
    }

    /// Whether both handles refer to the same client
    pub fn ptr_eq(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append an interceptor to the client chain
    pub fn use_interceptor<I: Interceptor + 'static>(&self, interceptor: I) -> &Self {
        self.inner.interceptors.write().push(Arc::new(interceptor));
        self
    }

    /// Bind `context` to the calls made through the returned emitter
    pub fn emit_message(&self, context: CallContext) -> Emitter<'_> {
        Emitter {
            client: self,
            context: Arc::new(context),
        }
    }

    /// Emit one call of `name` with positional arguments.
    ///
    /// One-way calls resolve with `Value::Null` once the transport accepted
    /// them. Two-way calls resolve with the reply value, or fail with the
    /// error it carries.
    pub async fn emit(
        &self,
        context: Arc<CallContext>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let Some(message) = self.inner.protocol.message(name) else {
            return Err(CallError::UnknownMessage(name.to_string()));
        };

        let expected = message.request().len();
        if args.len() != expected {
            return Err(CallError::InvalidArguments {
                message: name.to_string(),
                reason: format!("expected {} arguments, got {}", expected, args.len()),
            });
        }

        let chain = self.inner.interceptors.read().clone();
        let scope = Scope::new(Origin::Client(self.clone()), context, name);
        let mut req = WrappedRequest::new(scope, args);
        let terminal = TransportTerminal {
            transport: self.inner.transport.as_ref(),
        };

        debug!(message = name, id = req.context().id(), "emitting call");

        if message.is_one_way() {
            execute(&chain, &terminal, &mut req, None).await?;
            return Ok(Value::Null);
        }

        let mut res = WrappedResponse::new(name);
        execute(&chain, &terminal, &mut req, Some(&mut res)).await?;

        match res.into_body() {
            None => Ok(Value::Null),
            Some(ReplyBody::Result(value)) => Ok(value),
            Some(ReplyBody::Error(envelope)) => Err(envelope.into_call_error(message)),
        }
    }
}

/// Calls emitted under one [`CallContext`]
#[derive(Debug, Clone)]
pub struct Emitter<'a> {
    client: &'a Client,
    context: Arc<CallContext>,
}

impl Emitter<'_> {
    pub fn context(&self) -> &Arc<CallContext> {
        &self.context
    }

    /// Call `name` with typed arguments and decode the result.
    ///
    /// `args` must serialize to a sequence (usually a tuple) with one entry
    /// per request field; `()` stands for no arguments.
    pub async fn call<A, R>(&self, name: &str, args: A) -> Result<R, CallError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = match serde_json::to_value(args) {
            Ok(Value::Array(args)) => args,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => {
                return Err(CallError::InvalidArguments {
                    message: name.to_string(),
                    reason: format!("arguments must be a sequence, got {}", other),
                });
            }
            Err(e) => {
                return Err(CallError::InvalidArguments {
                    message: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let value = self.call_raw(name, args).await?;
        serde_json::from_value(value)
            .map_err(|e| CallError::Transport(TransportError::Codec(e.to_string())))
    }

    pub async fn call_raw(&self, name: &str, args: Vec<Value>) -> Result<Value, CallError> {
        self.client.emit(self.context.clone(), name, args).await
    }
}

struct TransportTerminal<'a> {
    transport: &'a dyn Transport,
}

#[async_trait]
impl Terminal for TransportTerminal<'_> {
    async fn call(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
    ) -> Result<(), CallError> {
        let call = WireCall {
            message: req.message().to_string(),
            args: req.args().to_vec(),
            headers: req.context().to_headers(),
        };

        match res {
            None => self.transport.post(call).await?,
            Some(res) => {
                let reply = self.transport.call(call).await?;
                res.set_body(reply.body);
            }
        }

        Ok(())
    }
}
