use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment variable overrides (`TUBEPIPE_SERVER__PORT=9000`).
const ENV_PREFIX: &str = "TUBEPIPE_";

/// Load configuration from file with environment variable overrides.
///
/// A missing file is not an error when `required` is false: every section has
/// defaults, so the service can run from environment variables alone.
pub fn load_config(path: &Path, required: bool) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else if required {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
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
[server]
port = 9000

[tools]
acquisition_path = "/opt/bin/yt-dlp"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.tools.acquisition_path.to_str().unwrap(),
            "/opt/bin/yt-dlp"
        );
        assert_eq!(config.tools.transcode_path.to_str().unwrap(), "ffmpeg");
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.streaming.buffer_size, 512 * 1024);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[server]
port = "not-a-port"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"), true);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_missing_optional_file() {
        let config = load_config(Path::new("/nonexistent/config.toml"), false).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "tubepipe.db");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[streaming]
pipeline_timeout_secs = 600
late_failure_policy = "fail"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path(), true).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.streaming.pipeline_timeout_secs, Some(600));
        assert_eq!(
            config.streaming.late_failure_policy,
            crate::config::LateFailurePolicy::Fail
        );
    }
}
