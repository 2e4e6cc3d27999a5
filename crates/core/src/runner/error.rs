//! Error types for the process runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running an external process.
///
/// A non-zero exit code is not an error at this level; it is returned in
/// [`super::ProcessOutcome`] and classified by the caller.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The binary could not be started (missing, not executable, ...).
    #[error("failed to launch {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the process failed after it was started.
    #[error("I/O error while running {}: {source}", .program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cancel token fired before the process finished.
    #[error("process cancelled")]
    Cancelled,
}

impl RunnerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the launch failed because the binary does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Launch { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_not_found() {
        let err = RunnerError::Launch {
            program: PathBuf::from("ffmpeg"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "failed to launch ffmpeg: missing");
    }

    #[test]
    fn test_cancelled_is_not_launch_failure() {
        assert!(RunnerError::Cancelled.is_cancelled());
        assert!(!RunnerError::Cancelled.is_not_found());
    }
}
