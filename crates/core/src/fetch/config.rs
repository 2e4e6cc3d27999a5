//! Configuration for the fetcher.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Format selector passed to `-f`.
    #[serde(default = "default_format")]
    pub format: String,

    /// Attempts for sources with transient failures (currently X/Twitter).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Titles longer than this are cut in output filenames.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: u32,

    /// User agent sent to X/Twitter.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_format() -> String {
    "bestvideo+bestaudio/best".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_title_max_chars() -> u32 {
    100
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            title_max_chars: default_title_max_chars(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Number of files a download is expected to produce before merging.
    pub fn expected_parts(&self) -> usize {
        let first_choice = self.format.split('/').next().unwrap_or_default();
        first_choice.matches('+').count() + 1
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }
}
