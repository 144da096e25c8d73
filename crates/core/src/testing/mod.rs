//! Testing utilities: a scripted title resolver and stand-in tool fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use tubepipe_core::testing::{fixtures, MockTitleResolver};
//!
//! let titles = MockTitleResolver::new("Test Clip");
//! let acquire = fixtures::write_script(dir.path(), "acquire", "exec head -c 4096 /dev/zero")?;
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::args::SourceProfile;
use crate::title::TitleResolver;

/// Title resolver returning a fixed title and recording every lookup.
#[derive(Debug, Clone)]
pub struct MockTitleResolver {
    title: Arc<Mutex<String>>,
    calls: Arc<Mutex<Vec<(String, SourceProfile)>>>,
}

impl MockTitleResolver {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Arc::new(Mutex::new(title.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change the title returned by later lookups.
    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock().unwrap_or_else(|p| p.into_inner()) = title.into();
    }

    /// Lookups made so far, oldest first.
    pub fn calls(&self) -> Vec<(String, SourceProfile)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl TitleResolver for MockTitleResolver {
    async fn resolve(&self, url: &str, profile: SourceProfile) -> String {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((url.to_string(), profile));
        self.title.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Test fixtures and helper functions.
#[cfg(unix)]
pub mod fixtures {
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable `sh` script that ignores its arguments.
    pub fn write_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms)?;
        Ok(path)
    }

    /// Acquisition stand-in producing `bytes` zero bytes on stdout.
    pub fn zero_source(dir: &Path, bytes: usize) -> io::Result<PathBuf> {
        write_script(dir, "acquire", &format!("exec head -c {} /dev/zero", bytes))
    }

    /// Transcode stand-in copying stdin to stdout.
    pub fn passthrough(dir: &Path) -> io::Result<PathBuf> {
        write_script(dir, "transcode", "exec cat")
    }
}
