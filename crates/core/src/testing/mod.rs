//! Testing utilities for unit and end-to-end tests.
//!
//! [`MockProber`] replaces the ffprobe boundary. On unix the `fake_*`
//! builders produce shell scripts that stand in for the external tools so
//! the coordinator can be driven end to end without ffmpeg or yt-dlp.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidium_core::testing::{fake_ffmpeg_script, write_script, FakeEncode, MockProber};
//!
//! let ffmpeg = write_script(dir.path(), "ffmpeg", &fake_ffmpeg_script(&FakeEncode::default()));
//! let prober = MockProber::with_default(ProbeResult::unknown().with_duration(10.0));
//! ```

#[cfg(unix)]
mod fake_tools;
mod mock_prober;

#[cfg(unix)]
pub use fake_tools::{
    fake_ffmpeg_script, fake_ffprobe_script, fake_ytdlp_script, sh_quote, write_script,
    FakeDownload, FakeEncode,
};
pub use mock_prober::MockProber;
