use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tubepipe.db")
}

/// Locations and limits of the external executables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Media acquisition tool (yt-dlp compatible).
    #[serde(default = "default_acquisition_path")]
    pub acquisition_path: PathBuf,

    /// Media transcoding tool (ffmpeg compatible).
    #[serde(default = "default_transcode_path")]
    pub transcode_path: PathBuf,

    /// Upper bound for the metadata-only title lookup.
    #[serde(default = "default_title_timeout")]
    pub title_timeout_secs: u64,

    /// Probe both tools at startup and refuse to start if either is missing.
    #[serde(default = "default_verify_on_startup")]
    pub verify_on_startup: bool,
}

fn default_acquisition_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_transcode_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_title_timeout() -> u64 {
    30
}

fn default_verify_on_startup() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            acquisition_path: default_acquisition_path(),
            transcode_path: default_transcode_path(),
            title_timeout_secs: default_title_timeout(),
            verify_on_startup: default_verify_on_startup(),
        }
    }
}

/// What to record when an upstream process fails after bytes were already sent.
///
/// Response headers are committed by then, so this only affects the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LateFailurePolicy {
    /// Mark the job completed; the client kept the partial body.
    #[default]
    CompletePartial,
    /// Mark the job failed even though a partial body was delivered.
    Fail,
}

/// Streaming and buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Size of each pooled forwarding buffer in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Flush the response sink at least every this many bytes.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_bytes: usize,

    /// Maximum idle buffers retained by the pool.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle: usize,

    /// Overall deadline for one pipeline run. `None` disables it.
    #[serde(default)]
    pub pipeline_timeout_secs: Option<u64>,

    #[serde(default)]
    pub late_failure_policy: LateFailurePolicy,
}

fn default_buffer_size() -> usize {
    512 * 1024
}

fn default_flush_interval() -> usize {
    512 * 1024
}

fn default_pool_max_idle() -> usize {
    32
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            flush_interval_bytes: default_flush_interval(),
            pool_max_idle: default_pool_max_idle(),
            pipeline_timeout_secs: None,
            late_failure_policy: LateFailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "tubepipe.db");
        assert_eq!(config.tools.acquisition_path.to_str().unwrap(), "yt-dlp");
        assert_eq!(config.tools.title_timeout_secs, 30);
        assert!(config.tools.verify_on_startup);
        assert_eq!(config.streaming.flush_interval_bytes, 512 * 1024);
        assert_eq!(config.streaming.pool_max_idle, 32);
        assert!(config.streaming.pipeline_timeout_secs.is_none());
        assert_eq!(
            config.streaming.late_failure_policy,
            LateFailurePolicy::CompletePartial
        );
    }

    #[test]
    fn test_deserialize_streaming_section() {
        let toml = r#"
[streaming]
buffer_size = 65536
flush_interval_bytes = 131072
late_failure_policy = "complete_partial"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.streaming.buffer_size, 65536);
        assert_eq!(config.streaming.flush_interval_bytes, 131072);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml = r#"
[streaming]
late_failure_policy = "shrug"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
