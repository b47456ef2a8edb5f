//! Error kinds surfaced to callers of the engine.
//!
//! Transient network failures never reach this type directly: they are
//! absorbed by the [`retry`](crate::retry) supervisor and only escalate here
//! once retries are exhausted.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("precondition failed: {0}")]
    PreconditionFailure(String),

    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    #[error("cancelled")]
    CancellationRequested,

    #[error("local I/O failure at {path}: {source}")]
    LocalIoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resume record is corrupt: {0}")]
    CorruptResumeRecord(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::LocalIoFailure {
            path: path.into(),
            source,
        }
    }
}
