use std::time::Duration;

use thiserror::Error;

/// Problems found while assembling the runtime configuration. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("slurm API endpoint is required")]
    MissingEndpoint,

    #[error("invalid update interval {value:?}: {reason}")]
    InvalidInterval { value: String, reason: String },

    #[error("invalid listen address {value:?}: {reason}")]
    InvalidListenAddress { value: String, reason: String },
}

/// Failures of a single node inventory request. A refresh that hits one of these keeps the
/// previous targets.
#[derive(Debug, Error)]
pub enum SlurmError {
    #[error("failed to execute request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status code: {status}, body: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}
