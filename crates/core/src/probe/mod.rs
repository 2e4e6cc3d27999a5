//! Source media probing.
//!
//! Probing never fails a task: each query that cannot be answered is logged
//! and left unknown so the planners can fall back to their constants.

mod capabilities;
mod ffprobe;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use ffprobe::FfprobeProber;
pub use traits::MediaProber;
pub use types::{bit_depth_of, ProbeError, ProbeResult};
