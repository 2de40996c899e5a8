//! Error taxonomy for the translation pipeline.
//!
//! Every failure is local to the batch that produced it: the batch stays at
//! the queue head and is resubmitted after a fixed backoff. Nothing here is
//! fatal to the pipeline itself.

use thiserror::Error;

/// Failures a batch submission can end in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The feature is switched off for this page. Not a real error; the
    /// batch stays queued and is resubmitted once translation is re-enabled.
    #[error("translation is disabled")]
    Disabled,

    /// Transport, auth or rate-limit failure reported by the remote backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// The response payload could not be decoded as a JSON array of strings.
    #[error("malformed response payload: {0}")]
    Shape(String),

    /// The response array length does not match the request array length.
    /// The aligned prefix has already been cached when this is returned.
    #[error("translation count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Configuration store I/O failure.
    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    /// Whether another submission attempt after the backoff delay makes
    /// sense. `Disabled` is the one exception: the queue waits for a toggle
    /// event instead of burning timer wakeups.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::Disabled)
    }
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        PipelineError::Store(error.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        PipelineError::Backend(error.to_string())
    }
}

/// Failure of the key-value configuration store.
///
/// Callers reading configuration treat this as "value absent" and fall back
/// to hardcoded defaults; callers writing log and carry on.
#[derive(Error, Debug, Clone)]
#[error("config store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new<T: std::fmt::Display>(message: T) -> Self {
        StoreError(message.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError(error.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
