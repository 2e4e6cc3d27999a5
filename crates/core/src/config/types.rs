use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::fetch::FetchConfig;
use crate::planner::EncodingConfig;
use crate::runner::RunnerConfig;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Locations of the external tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Encoder binary (default: "ffmpeg" on PATH)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    /// Probe binary (default: "ffprobe" on PATH)
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,
    /// Fetch binary (default: "yt-dlp" on PATH)
    #[serde(default = "default_ytdlp")]
    pub ytdlp_path: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            ytdlp_path: default_ytdlp(),
        }
    }
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_ytdlp() -> PathBuf {
    PathBuf::from("yt-dlp")
}

impl ToolsConfig {
    /// Directory holding the encoder, when it is configured by path rather
    /// than looked up on PATH. Handed to the fetch tool for stream merging.
    pub fn ffmpeg_dir(&self) -> Option<&Path> {
        self.ffmpeg_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}
