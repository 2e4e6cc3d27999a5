//! URL downloads through yt-dlp.
//!
//! The fetch tool reports progress through a `--progress-template` hook line
//! (see [`crate::progress::FetchHookEvent`]) and the final path through a
//! `--print after_move:` line, so everything runs through the ordinary
//! [`crate::runner::ProcessRunner`].

mod config;
mod error;
mod fetcher;
mod source;

pub use config::FetchConfig;
pub use error::FetchError;
pub use fetcher::{validate_url, FetchOutcome, Fetcher, OUTPUT_PREFIX};
pub use source::{host_of, SourceSite};
