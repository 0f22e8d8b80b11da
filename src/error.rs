use thiserror::Error;

/// Failures that abort loading a source. Bad cells, bad dates and misaligned
/// office columns never end up here; they degrade to empty values instead.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("gviz payload not found in response body")]
    PayloadNotFound,

    #[error("malformed gviz payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
