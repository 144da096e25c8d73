//! Display title lookup and sanitization.
//!
//! Titles end up inside a `Content-Disposition` header and a download file
//! name, so they are scrubbed of anything that could break either.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::args::{build_title_args, SourceProfile};
use crate::metrics;

/// Maximum title length in code points.
pub const MAX_TITLE_CHARS: usize = 200;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Resolves a human-readable title for a source URL.
///
/// Implementations must never fail: on any problem they return a fallback title.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    async fn resolve(&self, url: &str, profile: SourceProfile) -> String;
}

/// Title resolver that runs the acquisition tool in metadata-only mode.
pub struct CommandTitleResolver {
    program: PathBuf,
    timeout: Duration,
}

impl CommandTitleResolver {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn lookup(&self, url: &str, profile: SourceProfile) -> Result<Vec<u8>, String> {
        let output = Command::new(&self.program)
            .args(build_title_args(url, profile))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, output)
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))?
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl TitleResolver for CommandTitleResolver {
    async fn resolve(&self, url: &str, profile: SourceProfile) -> String {
        match self.lookup(url, profile).await {
            Ok(stdout) => {
                let title = sanitize_title(&stdout);
                if title.is_empty() {
                    debug!(url, "Title lookup returned nothing usable");
                    metrics::TITLE_FALLBACKS.inc();
                    fallback_title()
                } else {
                    title
                }
            }
            Err(reason) => {
                warn!(url, %reason, "Failed to resolve title");
                metrics::TITLE_FALLBACKS.inc();
                fallback_title()
            }
        }
    }
}

/// Title used when the real one cannot be determined.
pub fn fallback_title() -> String {
    format!("download_{}", Utc::now().timestamp())
}

/// Turns raw tool output into a file-name and header safe title.
///
/// Invalid UTF-8 fragments are dropped, control characters and `<>:"/\|?*`
/// removed, whitespace runs collapsed, ends trimmed and the result capped at
/// [`MAX_TITLE_CHARS`] code points.
pub fn sanitize_title(raw: &[u8]) -> String {
    let text: String = raw.utf8_chunks().map(|chunk| chunk.valid()).collect();

    let mut cleaned = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() || FORBIDDEN_CHARS.contains(&c) {
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push(' ');
        }
        pending_space = false;
        cleaned.push(c);
    }

    let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Builds a `Content-Disposition` value offering `title.extension` as a download.
///
/// The quoted `filename` is restricted to printable ASCII; the full title is
/// carried percent-encoded in `filename*`.
pub fn content_disposition(title: &str, extension: &str) -> String {
    let file_name = format!("{}.{}", title, extension);
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(&file_name)
    )
}
