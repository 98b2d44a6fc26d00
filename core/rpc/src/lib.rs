// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Message dispatch core
//!
//! A [`Protocol`] names a set of messages. A [`Client`] emits calls of those
//! messages through a [`Transport`], a [`Server`] dispatches them to the
//! registered handlers. Both sides wrap every call in an onion of
//! [`Interceptor`]s, and errors raised by handlers are classified once, at
//! the server, into declared errors or generic application errors.

pub mod classifier;
pub mod client;
pub mod context;
pub mod errors;
pub mod interceptor;
pub mod message;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod transport;

pub use classifier::{ErrorEnvelope, classify};
pub use client::{Client, ClientConfig, Emitter};
pub use context::{CORRELATION_KEY, CallContext, DEADLINE_KEY, Origin, Scope};
pub use errors::{
    ApplicationError, CallError, Cause, DeclaredError, ErrorKind, ErrorType, HandlerError,
    TransportError,
};
pub use interceptor::{Hook, Timeout};
pub use message::{ReplyBody, WireCall, WireReply, WrappedRequest, WrappedResponse};
pub use middleware::{Interceptor, Next, Terminal, execute, from_fn};
pub use protocol::{ErrorDescriptor, Field, Message, Protocol};
pub use server::{FailureHook, Handler, Server};
pub use transport::{LocalTransport, Transport};
