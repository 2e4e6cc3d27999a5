use super::{types::Config, ConfigError};
use crate::planner::Quality;

/// Validate configuration
/// Currently validates:
/// - Tool paths are not empty
/// - Encoding fallbacks are usable
/// - Fetch retries make at least one attempt
/// - Coordinator and runner buffers are not zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let tools = [
        ("tools.ffmpeg_path", &config.tools.ffmpeg_path),
        ("tools.ffprobe_path", &config.tools.ffprobe_path),
        ("tools.ytdlp_path", &config.tools.ytdlp_path),
    ];
    for (name, path) in tools {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    if config.encoding.fallback_bitrate_bps == 0 {
        return Err(ConfigError::ValidationError(
            "encoding.fallback_bitrate_bps cannot be 0".to_string(),
        ));
    }
    if config.encoding.gif_width == 0 {
        return Err(ConfigError::ValidationError(
            "encoding.gif_width cannot be 0".to_string(),
        ));
    }
    if Quality::try_from(config.encoding.default_quality).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "encoding.default_quality must be between {} and {}",
            Quality::MIN,
            Quality::MAX
        )));
    }

    if config.fetch.format.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "fetch.format cannot be empty".to_string(),
        ));
    }
    if config.fetch.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.coordinator.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "coordinator.event_buffer cannot be 0".to_string(),
        ));
    }
    if config.runner.max_log_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "runner.max_log_bytes cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_tool_path_fails() {
        let mut config = Config::default();
        config.tools.ffprobe_path = PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("ffprobe")));
    }

    #[test]
    fn test_validate_quality_out_of_range_fails() {
        let mut config = Config::default();
        config.encoding.default_quality = 5;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = Config::default();
        config.fetch.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_event_buffer_fails() {
        let mut config = Config::default();
        config.coordinator.event_buffer = 0;
        assert!(validate_config(&config).is_err());
    }
}
