//! Target formats and the quality percentage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output format selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Mp4,
    Mkv,
    Webm,
    Gif,
    Mp3,
    Wav,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 6] = [
        Self::Mp4,
        Self::Mkv,
        Self::Webm,
        Self::Gif,
        Self::Mp3,
        Self::Wav,
    ];

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Gif => "gif",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// Targets that drop the video stream.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav)
    }

    /// Containers with a usable hardware encoder.
    pub fn supports_hardware(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Mkv)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
#[error("unsupported target format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == ext)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Quality slider position, a percentage in `[10, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

#[derive(Debug, Error)]
#[error("quality must be between 10 and 100, got {0}")]
pub struct QualityOutOfRange(pub u8);

impl Quality {
    pub const MIN: u8 = 10;
    pub const MAX: u8 = 100;

    pub fn percent(self) -> u8 {
        self.0
    }

    /// `floor(value * percent / 100)`.
    pub fn scale(self, value: u64) -> u64 {
        (u128::from(value) * u128::from(self.0) / 100) as u64
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<u8> for Quality {
    type Error = QualityOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(QualityOutOfRange(value))
        }
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> u8 {
        q.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
