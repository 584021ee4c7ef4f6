use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tokio::time::timeout;

use bytes::Bytes;
use mini_lambda::simulated::{Completion, Endpoint};
use mini_lambda::{handler_fn, run, Client, Context, Error};

// The loop reads its endpoint from the environment, so tests that start
// it must not interleave.
static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn set_runtime_env(addr: SocketAddr) {
    std::env::set_var("AWS_LAMBDA_RUNTIME_API", addr.to_string());
    std::env::set_var("AWS_LAMBDA_FUNCTION_NAME", "test-fn");
    std::env::set_var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "128");
    std::env::set_var("AWS_LAMBDA_FUNCTION_VERSION", "$LATEST");
}

async fn next_completion(endpoint: &mut Endpoint) -> Completion {
    timeout(Duration::from_secs(5), endpoint.completion())
        .await
        .expect("timed out waiting for a completion")
        .expect("endpoint closed before a completion arrived")
}

async fn echo(event: Value, context: Context) -> Result<Value, Error> {
    assert!(!context.request_id.is_empty());
    assert!(context.deadline > 0);
    Ok(event)
}

async fn failing(_: Value, _: Context) -> Result<Value, Error> {
    Err("boom".into())
}

#[tokio::test]
async fn each_event_is_reported_exactly_once() {
    let _guard = ENV_LOCK.lock().unwrap();
    let mut endpoint = Endpoint::bind(vec![json!({"n": 1}), json!({"n": 2})]).unwrap();
    set_runtime_env(endpoint.addr());

    let task = tokio::spawn(run(handler_fn(echo)));

    let mut seen = Vec::new();
    for expected in &[json!({"n": 1}), json!({"n": 2})] {
        match next_completion(&mut endpoint).await {
            Completion::Response { request_id, body } => {
                let body: Value = serde_json::from_slice(&body).unwrap();
                assert_eq!(&body, expected);
                seen.push(request_id);
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }
    assert_ne!(seen[0], seen[1], "request ids must be per-invocation");

    task.abort();
}

#[tokio::test]
async fn handler_errors_are_posted_as_diagnostics() {
    let _guard = ENV_LOCK.lock().unwrap();
    let mut endpoint = Endpoint::bind(vec![json!(null)]).unwrap();
    set_runtime_env(endpoint.addr());

    let task = tokio::spawn(run(handler_fn(failing)));

    match next_completion(&mut endpoint).await {
        Completion::Failure { diagnostic, .. } => {
            assert_eq!(diagnostic.error_type, "HandlerError");
            assert!(diagnostic.error_message.contains("boom"));
        }
        other => panic!("expected a failure, got {:?}", other),
    }

    task.abort();
}

#[tokio::test]
async fn handler_panics_are_posted_as_diagnostics() {
    async fn panics_on_null(event: Value, _: Context) -> Result<Value, Error> {
        if event.is_null() {
            panic!("null events are unacceptable");
        }
        Ok(event)
    }

    let _guard = ENV_LOCK.lock().unwrap();
    let mut endpoint = Endpoint::bind(vec![json!(null), json!({"n": 2})]).unwrap();
    set_runtime_env(endpoint.addr());

    let task = tokio::spawn(run(handler_fn(panics_on_null)));

    match next_completion(&mut endpoint).await {
        Completion::Failure { diagnostic, .. } => {
            assert_eq!(diagnostic.error_type, "Panic");
            assert!(diagnostic.error_message.contains("unacceptable"));
        }
        other => panic!("expected a failure, got {:?}", other),
    }

    // The unwind must not take the loop down with it.
    match next_completion(&mut endpoint).await {
        Completion::Response { body, .. } => {
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body, json!({"n": 2}));
        }
        other => panic!("expected a response, got {:?}", other),
    }

    task.abort();
}

#[tokio::test]
async fn the_client_can_drive_the_runtime_api_directly() {
    let mut endpoint = Endpoint::bind(vec![json!({"n": 1})]).unwrap();
    let client = Client::new(&endpoint.addr().to_string()).unwrap();

    let event = client.next_invocation().await.unwrap();
    let request_id = event.headers()["lambda-runtime-aws-request-id"]
        .to_str()
        .unwrap()
        .to_owned();
    client
        .event_response(&request_id, Bytes::from_static(b"\"ok\""))
        .await
        .unwrap();

    match next_completion(&mut endpoint).await {
        Completion::Response { request_id: posted, body } => {
            assert_eq!(posted, request_id);
            assert_eq!(body.as_ref(), b"\"ok\"".as_ref());
        }
        other => panic!("expected a response, got {:?}", other),
    }
}

#[tokio::test]
async fn undecodable_events_do_not_kill_the_loop() {
    #[derive(serde::Deserialize, serde::Serialize)]
    struct Demand {
        name: String,
    }

    async fn typed(event: Demand, _: Context) -> Result<Demand, Error> {
        Ok(event)
    }

    let _guard = ENV_LOCK.lock().unwrap();
    let mut endpoint = Endpoint::bind(vec![json!(42), json!({"name": "ok"})]).unwrap();
    set_runtime_env(endpoint.addr());

    let task = tokio::spawn(run(handler_fn(typed)));

    match next_completion(&mut endpoint).await {
        Completion::Failure { diagnostic, .. } => {
            assert_eq!(diagnostic.error_type, "SerializationError");
        }
        other => panic!("expected a failure, got {:?}", other),
    }

    // The loop must carry on to the next, well-formed event.
    match next_completion(&mut endpoint).await {
        Completion::Response { body, .. } => {
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body, json!({"name": "ok"}));
        }
        other => panic!("expected a response, got {:?}", other),
    }

    task.abort();
}
