//! Mock prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::probe::{MediaProber, ProbeResult};

/// Mock implementation of the MediaProber trait.
///
/// Returns a configured result per path, or a default for unknown paths,
/// and records every probed path.
///
/// # Example
///
/// ```rust,ignore
/// use vidium_core::testing::MockProber;
///
/// let prober = MockProber::new();
/// prober
///     .set_result("/videos/a.mp4", ProbeResult::unknown().with_duration(10.0))
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct MockProber {
    results: Arc<RwLock<HashMap<PathBuf, ProbeResult>>>,
    default_result: Arc<RwLock<ProbeResult>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProber {
    /// Create a prober that knows nothing about any file.
    pub fn new() -> Self {
        Self::with_default(ProbeResult::unknown())
    }

    /// Create a prober that answers `result` for every path.
    pub fn with_default(result: ProbeResult) -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            default_result: Arc::new(RwLock::new(result)),
            probed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_result(&self, path: impl Into<PathBuf>, result: ProbeResult) {
        self.results.write().await.insert(path.into(), result);
    }

    pub async fn set_default(&self, result: ProbeResult) {
        *self.default_result.write().await = result;
    }

    /// Paths probed so far, in order.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl MediaProber for MockProber {
    async fn probe(&self, path: &Path) -> ProbeResult {
        self.probed.write().await.push(path.to_path_buf());
        match self.results.read().await.get(path) {
            Some(result) => result.clone(),
            None => self.default_result.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_and_default_results() {
        let prober = MockProber::with_default(ProbeResult::unknown().with_duration(5.0));
        prober
            .set_result("/a.mp4", ProbeResult::unknown().with_duration(10.0))
            .await;

        assert_eq!(
            prober.probe(Path::new("/a.mp4")).await.duration_secs,
            Some(10.0)
        );
        assert_eq!(
            prober.probe(Path::new("/b.mp4")).await.duration_secs,
            Some(5.0)
        );
        assert_eq!(
            prober.probed_paths().await,
            vec![PathBuf::from("/a.mp4"), PathBuf::from("/b.mp4")]
        );
    }
}
