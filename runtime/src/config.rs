use std::env;

use crate::Error;

/// Configuration derived from the environment variables the Lambda
/// execution environment sets for every function.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// The `host:port` of the runtime API, from `AWS_LAMBDA_RUNTIME_API`.
    pub endpoint: String,
    /// The name of the function, from `AWS_LAMBDA_FUNCTION_NAME`.
    pub function_name: String,
    /// The memory allocated to the function in MB, from
    /// `AWS_LAMBDA_FUNCTION_MEMORY_SIZE`.
    pub memory: i32,
    /// The version of the function being executed, from
    /// `AWS_LAMBDA_FUNCTION_VERSION`.
    pub version: String,
    /// The CloudWatch log stream, from `AWS_LAMBDA_LOG_STREAM_NAME`.
    pub log_stream: String,
    /// The CloudWatch log group, from `AWS_LAMBDA_LOG_GROUP_NAME`.
    pub log_group: String,
}

impl Config {
    /// Reads the configuration from the process environment. The log
    /// stream and group are optional; everything else must be present.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Config {
            endpoint: env::var("AWS_LAMBDA_RUNTIME_API")?,
            function_name: env::var("AWS_LAMBDA_FUNCTION_NAME")?,
            memory: env::var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")?.parse::<i32>()?,
            version: env::var("AWS_LAMBDA_FUNCTION_VERSION")?,
            log_stream: env::var("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
            log_group: env::var("AWS_LAMBDA_LOG_GROUP_NAME").unwrap_or_default(),
        })
    }
}
