use std::io;
use thiserror::Error;

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP parsing error: {0}")]
    HttpParse(String),

    #[error("request head exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("timed out waiting for request")]
    RequestTimeout,

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("control plane already started")]
    AlreadyStarted,

    #[error("moderation sink unavailable: {0}")]
    ModerationUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
