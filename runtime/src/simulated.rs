//! An in-process stand-in for the Lambda runtime interface.
//!
//! [`Endpoint`] binds an ephemeral local port, serves a fixed queue of
//! events to the poll endpoint, and records everything posted back to the
//! response and error endpoints. Tests point `AWS_LAMBDA_RUNTIME_API` at
//! [`Endpoint::addr`] and drive the real [`run`](crate::run) loop against it.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::sync::mpsc;

use crate::types::Diagnostic;
use crate::Error;

/// A completion reported by the runtime loop for one invocation.
#[derive(Debug)]
pub enum Completion {
    /// A successful result was posted to the response endpoint.
    Response {
        /// The request ID the completion was posted under.
        request_id: String,
        /// The serialized response body.
        body: Bytes,
    },
    /// A diagnostic was posted to the error endpoint.
    Failure {
        /// The request ID the diagnostic was posted under.
        request_id: String,
        /// The reported diagnostic.
        diagnostic: Diagnostic,
    },
}

struct Inner {
    events: VecDeque<serde_json::Value>,
    next_id: u64,
}

struct State {
    inner: Mutex<Inner>,
    completions: mpsc::UnboundedSender<Completion>,
}

/// A local runtime interface endpoint backed by a queue of events.
#[derive(Debug)]
pub struct Endpoint {
    addr: SocketAddr,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl Endpoint {
    /// Binds an endpoint on an ephemeral local port that serves `events`
    /// one per poll. Once the queue is drained, further polls stay pending
    /// so the loop parks instead of erroring out.
    ///
    /// Must be called within a tokio runtime.
    pub fn bind(events: Vec<serde_json::Value>) -> Result<Endpoint, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(State {
            inner: Mutex::new(Inner {
                events: events.into(),
                next_id: 0,
            }),
            completions: tx,
        });

        let make = make_service_fn(move |_conn| {
            let state = state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone())))
            }
        });

        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let server = Server::try_bind(&addr)?.serve(make);
        let addr = server.local_addr();
        tokio::spawn(server);

        Ok(Endpoint {
            addr,
            completions: rx,
        })
    }

    /// The address to point `AWS_LAMBDA_RUNTIME_API` at.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the next completion posted by the runtime loop.
    pub async fn completion(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }
}

async fn handle(req: Request<Body>, state: Arc<State>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    if method == Method::GET && path == "/2018-06-01/runtime/invocation/next" {
        return Ok(next_event(&state).await);
    }

    if method == Method::POST {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["2018-06-01", "runtime", "invocation", id, "response"] => {
                let request_id = (*id).to_owned();
                return Ok(record_response(req, &state, request_id).await);
            }
            ["2018-06-01", "runtime", "invocation", id, "error"] => {
                let request_id = (*id).to_owned();
                return Ok(record_failure(req, &state, request_id).await);
            }
            _ => {}
        }
    }

    Ok(status(StatusCode::NOT_FOUND))
}

async fn next_event(state: &State) -> Response<Body> {
    let next = {
        let mut inner = match state.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return status(StatusCode::INTERNAL_SERVER_ERROR),
        };
        inner.events.pop_front().map(|event| {
            inner.next_id += 1;
            (inner.next_id, event)
        })
    };

    match next {
        Some((id, event)) => {
            let deadline = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64
                + 3_000;
            respond(
                Response::builder()
                    .header("lambda-runtime-aws-request-id", format!("id-{}", id))
                    .header("lambda-runtime-deadline-ms", deadline.to_string())
                    .header(
                        "lambda-runtime-invoked-function-arn",
                        "arn:aws:lambda:us-east-1:123456789012:function:hello",
                    )
                    .header(
                        "lambda-runtime-trace-id",
                        "Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700",
                    )
                    .body(Body::from(event.to_string())),
            )
        }
        // The queue is drained. Park the poll forever.
        None => futures_util::future::pending::<Response<Body>>().await,
    }
}

async fn record_response(req: Request<Body>, state: &State, request_id: String) -> Response<Body> {
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(_) => return status(StatusCode::INTERNAL_SERVER_ERROR),
    };
    let _ = state
        .completions
        .send(Completion::Response { request_id, body });
    status(StatusCode::ACCEPTED)
}

async fn record_failure(req: Request<Body>, state: &State, request_id: String) -> Response<Body> {
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(_) => return status(StatusCode::INTERNAL_SERVER_ERROR),
    };
    let diagnostic: Diagnostic = match serde_json::from_slice(&body) {
        Ok(diagnostic) => diagnostic,
        Err(_) => return status(StatusCode::BAD_REQUEST),
    };
    let _ = state.completions.send(Completion::Failure {
        request_id,
        diagnostic,
    });
    status(StatusCode::ACCEPTED)
}

fn status(code: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = code;
    res
}

fn respond(result: http::Result<Response<Body>>) -> Response<Body> {
    result.unwrap_or_else(|_| status(StatusCode::INTERNAL_SERVER_ERROR))
}
