// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::CallError;
use crate::message::{WrappedRequest, WrappedResponse};
use crate::middleware::{Interceptor, Next};

/// Before-only interceptor: runs a closure on the request, then always
/// continues the chain.
pub struct Hook<F> {
    f: F,
}

impl<F> Hook<F>
where
    F: Fn(&mut WrappedRequest) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Hook { f }
    }
}

#[async_trait]
impl<F> Interceptor for Hook<F>
where
    F: Fn(&mut WrappedRequest) + Send + Sync,
{
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError> {
        (self.f)(req);
        next.run(req, res).await
    }
}

/// Bounds the inner part of the chain in time.
///
/// The limit is the smaller of the configured one and the time left before
/// the call context deadline. Once it elapses the inner chain is dropped and
/// the call fails with [`CallError::DeadlineExceeded`].
#[derive(Debug, Clone, Default)]
pub struct Timeout {
    limit: Option<Duration>,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Timeout { limit: Some(limit) }
    }

    /// Only enforce the deadline carried by the call context
    pub fn from_context() -> Self {
        Timeout { limit: None }
    }

    fn effective_limit(&self, req: &WrappedRequest) -> Option<Duration> {
        match (self.limit, req.context().remaining_time()) {
            (Some(limit), Some(remaining)) => Some(limit.min(remaining)),
            (limit, remaining) => limit.or(remaining),
        }
    }
}

#[async_trait]
impl Interceptor for Timeout {
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError> {
        let Some(limit) = self.effective_limit(req) else {
            return next.run(req, res).await;
        };

        let message = req.message().to_string();
        if limit.is_zero() {
            debug!(%message, "deadline already passed, not calling");
            return Err(CallError::DeadlineExceeded(message));
        }

        match tokio::time::timeout(limit, next.run(req, res)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(%message, ?limit, "call timed out");
                Err(CallError::DeadlineExceeded(format!(
                    "{} after {:?}",
                    message, limit
                )))
            }
        }
    }
}
