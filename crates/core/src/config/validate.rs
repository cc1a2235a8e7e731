use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Library root is set when background jobs run
/// - Watermark size ratio is within (0, 0.5]
/// - At least one preview origin
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.jobs.enabled && config.library.root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "library.root is required when jobs are enabled".to_string(),
        ));
    }

    let ratio = config.library.watermark.size_ratio;
    if !(ratio > 0.0 && ratio <= 0.5) {
        return Err(ConfigError::ValidationError(format!(
            "library.watermark.size_ratio must be in (0, 0.5], got {}",
            ratio
        )));
    }

    if config.preview.origins.iter().all(|o| o.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "preview.origins cannot be empty".to_string(),
        ));
    }

    Ok(())
}
