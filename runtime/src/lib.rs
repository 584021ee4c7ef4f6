#![deny(missing_docs)]

//! A minimal client for the AWS Lambda runtime interface.
//!
//! The runtime polls the runtime API for the next invocation, hands the
//! deserialized event and its [`Context`] to a user-provided [`Handler`],
//! and reports the outcome back to the API. Every invocation is reported
//! exactly once, as a response on success or as a [`Diagnostic`] on failure.
//!
//! An asynchronous function that accepts an event implementing
//! [`serde::Deserialize`] and a [`Context`], and returns a `Result<B, E>`
//! where `B` implements [`serde::Serialize`], can be wrapped with
//! [`handler_fn`] and driven with [`run`]:
//!
//! ```no_run
//! use mini_lambda::{handler_fn, run, Context, Error};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     run(handler_fn(func)).await?;
//!     Ok(())
//! }
//!
//! async fn func(event: Value, _: Context) -> Result<Value, Error> {
//!     Ok(event)
//! }
//! ```

use std::any::Any;
use std::convert::TryFrom;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::{FutureExt, StreamExt};
use hyper::client::connect::Connect;
use serde::{Deserialize, Serialize};
use tracing_futures::Instrument;

mod client;
mod config;
#[cfg(feature = "simulated")]
pub mod simulated;
mod types;

pub use client::Client;
pub use config::Config;
pub use types::{Context, Diagnostic};

/// Error type returned by the runtime and by user handlers.
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A processor of events, the seam between the runtime and user code.
pub trait Handler<A, B> {
    /// Errors returned by this handler.
    type Error: Into<Error>;
    /// Response of this handler.
    type Fut: Future<Output = Result<B, Self::Error>>;
    /// Process the incoming event and return the response asynchronously.
    fn call(&mut self, event: A, context: Context) -> Self::Fut;
}

/// Returns a new [`HandlerFn`] wrapping an `async fn(A, Context) -> Result<B, E>`.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// A [`Handler`] implemented by a closure over the event and its context.
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, A, B, Err, Fut> Handler<A, B> for HandlerFn<F>
where
    F: Fn(A, Context) -> Fut,
    Err: Into<Error>,
    Fut: Future<Output = Result<B, Err>>,
{
    type Error = Err;
    type Fut = Fut;

    fn call(&mut self, event: A, context: Context) -> Self::Fut {
        (self.f)(event, context)
    }
}

/// Starts the runtime and begins polling for events on the endpoint named
/// by the `AWS_LAMBDA_RUNTIME_API` environment variable.
///
/// The loop runs until the runtime API becomes unreachable. Failures local
/// to a single invocation, a handler error or panic or an event that does
/// not deserialize, are reported to the API's error endpoint and the loop
/// moves on to the next event.
pub async fn run<A, B, F>(handler: F) -> Result<(), Error>
where
    F: Handler<A, B>,
    A: for<'de> Deserialize<'de>,
    B: Serialize,
{
    let config = Config::from_env()?;
    let client = Client::new(&config.endpoint)?;
    run_inner(&client, &config, handler).await
}

fn incoming<'a, C>(
    client: &'a Client<C>,
) -> impl futures_core::Stream<Item = Result<hyper::Response<hyper::Body>, Error>> + 'a
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async_stream::stream! {
        loop {
            yield client.next_invocation().await;
        }
    }
}

async fn run_inner<C, A, B, F>(
    client: &Client<C>,
    config: &Config,
    mut handler: F,
) -> Result<(), Error>
where
    C: Connect + Clone + Send + Sync + 'static,
    F: Handler<A, B>,
    A: for<'de> Deserialize<'de>,
    B: Serialize,
{
    let incoming = incoming(client);
    tokio::pin!(incoming);

    while let Some(next) = incoming.next().await {
        let event = next?;
        let (parts, body) = event.into_parts();
        let body = hyper::body::to_bytes(body).await?;

        let context = Context::try_from(&parts.headers)?.with_config(config);
        let request_id = context.request_id.clone();
        tracing::trace!(%request_id, "received invocation");

        let mut de = serde_json::Deserializer::from_slice(&body);
        let event: A = match serde_path_to_error::deserialize(&mut de) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(%request_id, error = %err, "failed to deserialize event");
                let diagnostic = Diagnostic::new("SerializationError", err.to_string());
                client.event_error(&request_id, &diagnostic).await?;
                continue;
            }
        };

        let span = tracing::info_span!("invocation", %request_id);
        let call = AssertUnwindSafe(handler.call(event, context).instrument(span));
        match call.catch_unwind().await {
            Ok(Ok(response)) => {
                let body = serde_json::to_vec(&response)?;
                client.event_response(&request_id, body.into()).await?;
            }
            Ok(Err(err)) => {
                let err = err.into();
                tracing::error!(%request_id, error = %err, "handler failed");
                let diagnostic = Diagnostic::new("HandlerError", err.to_string());
                client.event_error(&request_id, &diagnostic).await?;
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!(%request_id, %message, "handler panicked");
                let diagnostic = Diagnostic::new("Panic", message);
                client.event_error(&request_id, &diagnostic).await?;
            }
        }
    }

    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}
