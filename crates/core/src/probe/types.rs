//! Probe result and error types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Read-only snapshot of a media file's properties.
///
/// Every field is optional because the probe tool may fail or report
/// nothing for a given query; consumers fall back to constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
    /// Overall bitrate in bits per second.
    pub bitrate_bps: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Pixel format of the first video stream (e.g. "yuv420p10le").
    pub pixel_format: Option<String>,
    /// 8 or 10, derived from the pixel format.
    pub bit_depth: u8,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            duration_secs: None,
            bitrate_bps: None,
            width: None,
            height: None,
            pixel_format: None,
            bit_depth: 8,
        }
    }
}

impl ProbeResult {
    /// A result where nothing could be determined.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_bitrate(mut self, bps: u64) -> Self {
        self.bitrate_bps = Some(bps);
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets the pixel format and the bit depth derived from it.
    pub fn with_pixel_format(mut self, pix_fmt: impl Into<String>) -> Self {
        let pix_fmt = pix_fmt.into();
        self.bit_depth = bit_depth_of(&pix_fmt);
        self.pixel_format = Some(pix_fmt);
        self
    }

    pub fn is_ten_bit(&self) -> bool {
        self.bit_depth >= 10
    }
}

/// Bit depth implied by an ffmpeg pixel format name.
pub fn bit_depth_of(pix_fmt: &str) -> u8 {
    let pix_fmt = pix_fmt.to_ascii_lowercase();
    if pix_fmt.contains("10le") || pix_fmt.contains("10be") || pix_fmt.starts_with("p010") {
        10
    } else {
        8
    }
}

/// Errors from a single probe query. Never surfaced past the prober.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("FFprobe not found at path: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error running ffprobe: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffprobe exited with {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("no value for {field}")]
    Empty { field: &'static str },

    #[error("unparsable {field}: {value:?}")]
    Unparsable { field: &'static str, value: String },
}
