//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the task coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Directory for palette images and other scratch files.
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Capacity of the event channel. Progress and log events are dropped
    /// while it is full; lifecycle events wait for room.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Delete the source file after a successful plain trim.
    #[serde(default)]
    pub delete_source_after_trim: bool,

    /// Re-run a failed hardware encode once on the software path.
    #[serde(default)]
    pub cpu_fallback_on_gpu_failure: bool,

    /// Query the encoder for hardware support before the first GPU task.
    /// When disabled, hardware encoders are assumed present.
    #[serde(default = "default_detect_capabilities")]
    pub detect_capabilities: bool,
}

fn default_event_buffer() -> usize {
    256
}

fn default_detect_capabilities() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            event_buffer: default_event_buffer(),
            delete_source_after_trim: false,
            cpu_fallback_on_gpu_failure: false,
            detect_capabilities: default_detect_capabilities(),
        }
    }
}

impl CoordinatorConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.event_buffer, 256);
        assert!(!config.delete_source_after_trim);
        assert!(!config.cpu_fallback_on_gpu_failure);
        assert!(config.detect_capabilities);
        assert_eq!(config.temp_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            temp_dir = "/scratch"
            cpu_fallback_on_gpu_failure = true
        "#;
        let config: CoordinatorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.temp_dir(), PathBuf::from("/scratch"));
        assert!(config.cpu_fallback_on_gpu_failure);
        assert_eq!(config.event_buffer, 256);
        assert!(config.detect_capabilities);
    }
}
