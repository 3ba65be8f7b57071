use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Service URL uses http or https
/// - Endpoint prefixes start with '/'
/// - Timeout and poll interval are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let url = config.service.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "service.url must start with http:// or https://, got '{}'",
            config.service.url
        )));
    }

    for (key, path) in [
        ("service.convert_path", &config.service.convert_path),
        ("service.batch_path", &config.service.batch_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/', got '{}'",
                key, path
            )));
        }
    }

    if config.service.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "service.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.polling.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "polling.interval_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config = Config::default();
        config.service.url = "ftp://files.local".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("service.url"));
    }

    #[test]
    fn test_validate_rejects_relative_batch_path() {
        let mut config = Config::default();
        config.service.batch_path = "api/batch".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("service.batch_path"));
    }

    #[test]
    fn test_validate_zero_interval_fails() {
        let mut config = Config::default();
        config.polling.interval_ms = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.service.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
