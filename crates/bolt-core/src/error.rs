use crate::upstream::UpstreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoltError {
    /// Malformed or missing caller input. The stage never starts.
    #[error("invalid input: {0}")]
    InputFormat(String),

    /// Nothing left after every fallback layer ran.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BoltError>;
