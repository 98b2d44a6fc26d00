// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Onion-style middleware executor shared by client and server
//!
//! Interceptors run in registration order around a terminal action. Each one
//! receives a [`Next`] continuation; calling [`Next::run`] enters the rest of
//! the chain and returns once every inner frame, and the terminal, are done.
//! With interceptors `[A, B]` and terminal `T` the order is
//! `A-before, B-before, T, B-after, A-after`.
//!
//! `Next` is consumed by `run`, so a frame can enter the inner chain at most
//! once and the terminal runs at most once per call. A frame that returns
//! without calling `run` short-circuits the call. An error returned by an
//! inner frame is handed to every outer frame on its way out.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::errors::CallError;
use crate::message::{WrappedRequest, WrappedResponse};

/// A single interceptor frame.
///
/// `res` is `None` for one-way messages, which have no response.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError>;
}

/// Action at the center of the chain
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
    ) -> Result<(), CallError>;
}

/// Continuation into the inner part of the chain
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    fn new(chain: &'a [Arc<dyn Interceptor>], terminal: &'a dyn Terminal) -> Self {
        Next { chain, terminal }
    }

    /// Number of frames left before the terminal
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    pub fn run<'b>(
        self,
        req: &'b mut WrappedRequest,
        res: Option<&'b mut WrappedResponse>,
    ) -> BoxFuture<'b, Result<(), CallError>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((head, rest)) => {
                    head.intercept(req, res, Next::new(rest, self.terminal))
                        .await
                }
                None => self.terminal.call(req, res).await,
            }
        })
    }
}

/// Run `chain` around `terminal` for one call
pub async fn execute(
    chain: &[Arc<dyn Interceptor>],
    terminal: &dyn Terminal,
    req: &mut WrappedRequest,
    res: Option<&mut WrappedResponse>,
) -> Result<(), CallError> {
    Next::new(chain, terminal).run(req, res).await
}

/// Interceptor built from a closure, see [`from_fn`]
pub struct FnInterceptor<F> {
    f: F,
}

/// Build an interceptor from a closure returning a boxed future:
///
/// ```ignore
/// client.use_interceptor(from_fn(|req, res, next| {
///     Box::pin(async move {
///         tracing::debug!(message = req.message(), "calling");
///         next.run(req, res).await
///     })
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnInterceptor<F>
where
    F: for<'a> Fn(
            &'a mut WrappedRequest,
            Option<&'a mut WrappedResponse>,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), CallError>>
        + Send
        + Sync,
{
    FnInterceptor { f }
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(
            &'a mut WrappedRequest,
            Option<&'a mut WrappedResponse>,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), CallError>>
        + Send
        + Sync,
{
    async fn intercept(
        &self,
        req: &mut WrappedRequest,
        res: Option<&mut WrappedResponse>,
        next: Next<'_>,
    ) -> Result<(), CallError> {
        (self.f)(req, res, next).await
    }
}
