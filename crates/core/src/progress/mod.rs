//! Normalization of external tool output into a 0–100 percentage.
//!
//! - [`EncodeProgress`]: elapsed-time tokens against a known duration.
//! - [`FetchProgress`]: fetch hook events over a growing set of parts.
//! - [`TaskProgress`]: phase slicing for composite tasks.
//!
//! While a task runs every estimator stays at or below 99; only the caller
//! reports 100, once, after the last process exited successfully.

mod encode;
mod fetch;
mod hook;
mod phase;

pub use encode::{parse_elapsed_secs, EncodeProgress};
pub use fetch::{DownloadPart, FetchProgress};
pub use hook::{FetchHookEvent, HookStatus, HOOK_PREFIX, HOOK_TEMPLATE};
pub use phase::TaskProgress;

/// Receives normalized percentages.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn emit(&self, percent: u8) {
        self(percent)
    }
}
