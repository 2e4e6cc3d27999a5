//! Process runner for external encode, probe and fetch tools.
//!
//! [`ProcessRunner::run`] spawns one process, drains stdout and stderr on two
//! concurrent reader loops, forwards every line to a [`LineSink`] and races
//! the whole thing against a [`CancelToken`].
//!
//! # Example
//!
//! ```ignore
//! use vidium_core::runner::{CancelToken, NullSink, ProcessRunner, ProcessSpec};
//!
//! let runner = ProcessRunner::with_defaults();
//! let spec = ProcessSpec::new("ffmpeg")
//!     .args(["-y", "-i", "in.mkv", "out.mp4"])
//!     .cleanup_on_cancel("out.mp4");
//!
//! let outcome = runner.run(&spec, &CancelToken::new(), &NullSink).await?;
//! if !outcome.success() {
//!     eprintln!("{}", outcome.log);
//! }
//! ```

mod cancel;
mod config;
mod error;
mod lines;
mod process;

pub use cancel::CancelToken;
pub use config::RunnerConfig;
pub use error::RunnerError;
pub use lines::LineSplitter;
pub use process::{
    LineSink, NullSink, OutputStream, ProcessOutcome, ProcessRunner, ProcessSpec,
};
