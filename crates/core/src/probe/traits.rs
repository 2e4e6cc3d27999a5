//! Prober trait.

use async_trait::async_trait;
use std::path::Path;

use super::types::ProbeResult;

/// Reads source properties ahead of planning.
///
/// Probing is best-effort: implementations log failures and return whatever
/// they could determine, leaving the rest `None`.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> ProbeResult;
}
