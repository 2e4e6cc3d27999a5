//! Task-level errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::planner::TrimError;
use crate::runner::RunnerError;

/// Why a task did not succeed.
///
/// `Cancelled` is terminal but not a failure; check
/// [`TaskError::is_cancelled`] before treating an error as one.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The request is incomplete or inconsistent.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The trim range does not fit the source.
    #[error("invalid trim: {0}")]
    Trim(#[from] TrimError),

    /// An external tool could not be started.
    #[error(transparent)]
    Launch(RunnerError),

    /// The encoder exited unsuccessfully.
    #[error("{program} failed with exit code {}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    EncodeFailed {
        program: String,
        exit_code: Option<i32>,
        log: String,
    },

    /// The download failed.
    #[error(transparent)]
    Fetch(FetchError),

    /// Preparing the output location failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Captured tool output attached to the failure, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::EncodeFailed { log, .. } => Some(log),
            Self::Fetch(e) => e.log(),
            _ => None,
        }
    }
}

impl From<RunnerError> for TaskError {
    fn from(err: RunnerError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Launch(err)
        }
    }
}

impl From<FetchError> for TaskError {
    fn from(err: FetchError) -> Self {
        match err {
            e if e.is_cancelled() => Self::Cancelled,
            FetchError::Runner(e) => Self::Launch(e),
            FetchError::InvalidUrl(url) => Self::Validation(format!("invalid URL: {}", url)),
            e => Self::Fetch(e),
        }
    }
}
