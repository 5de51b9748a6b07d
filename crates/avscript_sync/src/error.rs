use crate::gate::GateState;
use thiserror::Error;

/// Failure reported by a [`crate::autosave::ScriptStore`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Write quota exhausted. Retried after a delay.
    #[error("write quota exceeded")]
    QuotaExceeded,

    #[error("store error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("save gate busy ({0:?})")]
    Busy(GateState),

    #[error("autosave writer has shut down")]
    WriterClosed,

    #[error("autosave writer panicked: {0}")]
    WriterFailed(String),

    #[error(transparent)]
    Core(#[from] avscript_core::CoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
