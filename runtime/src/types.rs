use std::convert::TryFrom;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::{Config, Error};

/// Client context sent by the Lambda runtime interface alongside an event,
/// parsed from the response headers of the invocation poll.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Context {
    /// The AWS request ID generated by the Lambda service.
    pub request_id: String,
    /// The execution deadline for the current invocation, in milliseconds
    /// since the Unix epoch.
    pub deadline: u64,
    /// The ARN of the Lambda function being invoked.
    pub invoked_function_arn: String,
    /// The X-Ray trace ID for the current invocation.
    pub xray_trace_id: String,
    /// Environment configuration of the function, from [`Config::from_env`].
    pub env_config: Config,
}

impl Context {
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        self.env_config = config.clone();
        self
    }
}

impl<'a> TryFrom<&'a HeaderMap> for Context {
    type Error = Error;

    fn try_from(headers: &'a HeaderMap) -> Result<Self, Self::Error> {
        Ok(Context {
            request_id: required(headers, "lambda-runtime-aws-request-id")?,
            deadline: required(headers, "lambda-runtime-deadline-ms")?.parse::<u64>()?,
            invoked_function_arn: optional(headers, "lambda-runtime-invoked-function-arn"),
            xray_trace_id: optional(headers, "lambda-runtime-trace-id"),
            env_config: Config::default(),
        })
    }
}

fn required(headers: &HeaderMap, name: &str) -> Result<String, Error> {
    let value = headers
        .get(name)
        .ok_or_else(|| Error::from(format!("missing {} header", name)))?;
    Ok(value.to_str()?.to_owned())
}

fn optional(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// The error payload reported to the runtime API when an invocation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Coarse classification of the failure.
    pub error_type: String,
    /// Human-readable description of the failure.
    pub error_message: String,
}

impl Diagnostic {
    /// Creates a diagnostic from an error classification and message.
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Diagnostic {
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}
