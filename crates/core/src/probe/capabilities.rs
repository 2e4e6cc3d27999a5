//! Hardware encoder capability detection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Hardware encode support detected on the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// NVIDIA NVENC H.264 available
    pub h264_nvenc: bool,
    /// NVIDIA NVENC H.265/HEVC available
    pub hevc_nvenc: bool,
    /// CUDA decode acceleration available
    pub cuda_hwaccel: bool,
}

impl EncoderCapabilities {
    /// Assumes everything is available. Used when detection is disabled.
    pub fn assume_all() -> Self {
        Self {
            h264_nvenc: true,
            hevc_nvenc: true,
            cuda_hwaccel: true,
        }
    }

    /// Detect available hardware encoders by probing ffmpeg.
    pub async fn detect(ffmpeg_path: &Path) -> Self {
        let (encoders, hwaccels) = tokio::join!(
            list(ffmpeg_path, "-encoders"),
            list(ffmpeg_path, "-hwaccels"),
        );

        let caps = Self::from_listings(
            encoders.as_deref().unwrap_or_default(),
            hwaccels.as_deref().unwrap_or_default(),
        );
        debug!("Detected encoder capabilities: {:?}", caps);
        caps
    }

    fn from_listings(encoders: &str, hwaccels: &str) -> Self {
        Self {
            h264_nvenc: encoders.contains("h264_nvenc"),
            hevc_nvenc: encoders.contains("hevc_nvenc"),
            cuda_hwaccel: hwaccels.lines().any(|l| l.trim() == "cuda"),
        }
    }

    /// Whether a GPU encode can run for a source of the given bit depth.
    pub fn supports_gpu(&self, ten_bit: bool) -> bool {
        let encoder = if ten_bit {
            self.hevc_nvenc
        } else {
            self.h264_nvenc
        };
        encoder && self.cuda_hwaccel
    }

    /// Check if NVENC is available.
    pub fn has_nvenc(&self) -> bool {
        self.h264_nvenc || self.hevc_nvenc
    }
}

async fn list(ffmpeg_path: &Path, flag: &str) -> Option<String> {
    let output = Command::new(ffmpeg_path)
        .args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(o) if o.status.success() => Some(String::from_utf8_lossy(&o.stdout).to_string()),
        Ok(o) => {
            warn!("ffmpeg {} exited with {:?}", flag, o.status.code());
            None
        }
        Err(e) => {
            warn!("Could not run {} {}: {}", ffmpeg_path.display(), flag, e);
            None
        }
    }
}
