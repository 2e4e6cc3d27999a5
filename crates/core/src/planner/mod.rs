//! Pure planning of encoder invocations.
//!
//! [`EncodingPlanner`] turns a target format, quality percentage, GPU flag
//! and probe snapshot into an [`EncodingPlan`]; [`TrimPlanner`] validates a
//! time range and picks between stream copy and frame-accurate re-encode.
//! Neither performs I/O. Plans become encoder arguments only through
//! [`Invocation`].

mod config;
mod encoding;
mod format;
pub mod naming;
mod plan;
mod timecode;
mod trim;

pub use config::EncodingConfig;
pub use encoding::EncodingPlanner;
pub use format::{Quality, QualityOutOfRange, TargetFormat, UnknownFormat};
pub use plan::{
    AudioOnlyPlan, AudioPolicy, EncodingPlan, GifPlan, HwAccel, Invocation, VideoCodec,
    VideoPlan,
};
pub use timecode::Timecode;
pub use trim::{ReEncodeSettings, TrimError, TrimMode, TrimOptions, TrimPlanner, TrimSpec};
