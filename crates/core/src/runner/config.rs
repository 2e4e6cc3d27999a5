//! Configuration for the process runner.

use serde::{Deserialize, Serialize};

/// Configuration for [`super::ProcessRunner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on the captured log kept per process, in bytes.
    /// When exceeded, the oldest output is dropped.
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: usize,

    /// Read buffer size for stdout/stderr, in bytes.
    #[serde(default = "default_read_buffer")]
    pub read_buffer_bytes: usize,
}

fn default_max_log_bytes() -> usize {
    1024 * 1024
}

fn default_read_buffer() -> usize {
    8 * 1024
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_log_bytes: default_max_log_bytes(),
            read_buffer_bytes: default_read_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_log_bytes, 1024 * 1024);
        assert_eq!(config.read_buffer_bytes, 8192);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: RunnerConfig = toml::from_str("max_log_bytes = 4096").unwrap();
        assert_eq!(config.max_log_bytes, 4096);
        assert_eq!(config.read_buffer_bytes, 8192);
    }
}
