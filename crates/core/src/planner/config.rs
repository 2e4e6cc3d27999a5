//! Configuration for the encoding planner.

use serde::{Deserialize, Serialize};

/// Fallback constants used when probing could not answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Bitrate used by hardware and re-encode paths when the source bitrate
    /// is unknown, in bits per second.
    #[serde(default = "default_fallback_bitrate")]
    pub fallback_bitrate_bps: u64,

    /// Output width of GIF frames in pixels (height keeps aspect).
    #[serde(default = "default_gif_width")]
    pub gif_width: u32,

    /// Quality percentage used when a request does not specify one.
    #[serde(default = "default_quality")]
    pub default_quality: u8,
}

fn default_fallback_bitrate() -> u64 {
    5_000_000
}

fn default_gif_width() -> u32 {
    320
}

fn default_quality() -> u8 {
    100
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            fallback_bitrate_bps: default_fallback_bitrate(),
            gif_width: default_gif_width(),
            default_quality: default_quality(),
        }
    }
}

impl EncodingConfig {
    pub fn with_fallback_bitrate(mut self, bps: u64) -> Self {
        self.fallback_bitrate_bps = bps;
        self
    }

    pub fn with_gif_width(mut self, width: u32) -> Self {
        self.gif_width = width;
        self
    }
}
