use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `XCONVERT_POLLING__INTERVAL_MS`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("XCONVERT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load defaults with environment variable overrides only.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("XCONVERT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[service]
url = "http://converter.local:9000"

[polling]
interval_ms = 500
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.service.url, "http://converter.local:9000");
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.service.convert_path, "/api/convert");
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.service.url, "http://localhost:8082");
        assert_eq!(config.polling.interval_ms, 2000);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[polling]
interval_ms = "soon"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/xconvert.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[service]
url = "https://convert.example.com"
timeout_secs = 5

[output]
directory = "/tmp/converted"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.service.url, "https://convert.example.com");
        assert_eq!(config.service.timeout_secs, 5);
        assert_eq!(config.output.directory.to_str().unwrap(), "/tmp/converted");
        assert_eq!(config.polling.max_transient_retries, 0);
    }
}
