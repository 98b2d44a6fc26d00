// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::message::{WireCall, WireReply};
use crate::server::Server;

/// Duplex channel between a client and a server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a two-way call and wait for its reply
    async fn call(&self, call: WireCall) -> Result<WireReply, TransportError>;

    /// Hand off a one-way call; returns once the call is accepted for sending
    async fn post(&self, call: WireCall) -> Result<(), TransportError>;
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(value).map_err(|e| TransportError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(buf).map_err(|e| TransportError::Codec(e.to_string()))
}

/// In-process transport delivering calls to a [`Server`].
///
/// Calls and replies go through a JSON encoding on the way, so everything
/// the peers exchange must survive serialization.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    server: Server,
}

impl LocalTransport {
    pub fn new(server: Server) -> Self {
        LocalTransport { server }
    }

    fn through_wire(call: &WireCall) -> Result<WireCall, TransportError> {
        decode(&encode(call)?)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, call: WireCall) -> Result<WireReply, TransportError> {
        let call = Self::through_wire(&call)?;
        let message = call.message.clone();

        match self.server.dispatch(call).await {
            Ok(Some(reply)) => decode(&encode(&reply)?),
            Ok(None) => Err(TransportError::Dropped(format!(
                "no reply produced for {}",
                message
            ))),
            Err(e) => Err(TransportError::Rejected(e.to_string())),
        }
    }

    async fn post(&self, call: WireCall) -> Result<(), TransportError> {
        let call = Self::through_wire(&call)?;
        let server = self.server.clone();

        tokio::spawn(async move {
            let message = call.message.clone();
            match server.dispatch(call).await {
                Ok(None) => {}
                Ok(Some(_)) => debug!(%message, "discarding reply to one-way call"),
                Err(e) => warn!(%message, error = %e, "one-way call rejected"),
            }
        });

        Ok(())
    }
}
