//! Error types for the fetcher.

use thiserror::Error;

use crate::runner::RunnerError;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Not an http(s) URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// yt-dlp could not be started, or the fetch was cancelled.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// yt-dlp exited unsuccessfully.
    #[error("download failed with exit code {}{}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()), .hint.as_deref().map(|h| format!(": {}", h)).unwrap_or_default())]
    ToolFailed {
        exit_code: Option<i32>,
        log: String,
        hint: Option<String>,
    },

    /// yt-dlp succeeded without printing the final file path.
    #[error("download finished but no output file was reported")]
    MissingOutput { log: String },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Runner(RunnerError::Cancelled))
    }

    /// Captured tool output, when the tool ran.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { log, .. } | Self::MissingOutput { log } => Some(log),
            _ => None,
        }
    }
}
