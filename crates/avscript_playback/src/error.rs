use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to execute {tool}: {reason}")]
    ToolExec { tool: &'static str, reason: String },

    #[error("probe failed for {url}: {reason}")]
    ProbeFailed { url: String, reason: String },

    #[error("decode failed for {url}: {reason}")]
    DecodeFailed { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
