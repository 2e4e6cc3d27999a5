//! Helpers for temporary and partial output files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Removes a file, treating "already gone" as success.
///
/// Returns `Ok(true)` when a file was deleted.
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A file path whose file is deleted when the guard goes out of scope.
///
/// Used for artifacts that must not survive their pipeline regardless of how
/// it ends (success, failure, cancellation or an early `?`).
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary artifact {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary artifact {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
