use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Tool paths are not empty
/// - Buffer and flush sizes are non-zero
/// - Pipeline timeout, when set, is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.tools.acquisition_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tools.acquisition_path cannot be empty".to_string(),
        ));
    }

    if config.tools.transcode_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tools.transcode_path cannot be empty".to_string(),
        ));
    }

    if config.streaming.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "streaming.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.streaming.flush_interval_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "streaming.flush_interval_bytes cannot be 0".to_string(),
        ));
    }

    if config.streaming.pipeline_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "streaming.pipeline_timeout_secs must be positive (omit it to disable)".to_string(),
        ));
    }

    Ok(())
}

/// Checks that both external tools can be executed.
///
/// Runs `--version` for the acquisition tool and `-version` for the transcoder.
pub async fn verify_tools(config: &Config) -> Result<(), ConfigError> {
    probe_tool("acquisition", &config.tools.acquisition_path, "--version").await?;
    probe_tool("transcode", &config.tools.transcode_path, "-version").await?;
    Ok(())
}

async fn probe_tool(tool: &'static str, path: &Path, flag: &str) -> Result<(), ConfigError> {
    let output = Command::new(path)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| ConfigError::ToolUnavailable {
            tool,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.success() {
        return Err(ConfigError::ToolUnavailable {
            tool,
            path: path.to_path_buf(),
            reason: format!("exited with {}", output),
        });
    }

    Ok(())
}
