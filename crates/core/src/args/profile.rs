//! Source profiles and their acquisition policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::job::MediaKind;

/// Acquisition argument profile, chosen from the source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceProfile {
    /// Long-form video platforms and anything unrecognized.
    Generic,
    /// Short-form clip platforms; single progressive stream, no playlists.
    ShortForm,
}

/// Host markers that select a non-generic profile.
const HOST_MARKERS: &[(&str, SourceProfile)] = &[
    ("tiktok.com", SourceProfile::ShortForm),
    ("vm.tiktok.com", SourceProfile::ShortForm),
];

impl SourceProfile {
    /// Picks the profile for a source URL.
    pub fn detect(url: &str) -> Self {
        let url = url.to_ascii_lowercase();
        HOST_MARKERS
            .iter()
            .find(|(marker, _)| url.contains(marker))
            .map(|(_, profile)| *profile)
            .unwrap_or(SourceProfile::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceProfile::Generic => "generic",
            SourceProfile::ShortForm => "short_form",
        }
    }
}

impl fmt::Display for SourceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(SourceProfile::Generic),
            "short_form" => Ok(SourceProfile::ShortForm),
            other => Err(format!("unknown source profile: {}", other)),
        }
    }
}

/// Concurrency, buffering and tolerance settings for the acquisition tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    pub profile: SourceProfile,
    pub kind: MediaKind,
    pub concurrent_fragments: u32,
    pub buffer_size: &'static str,
    pub http_chunk_size: &'static str,
    pub retries: Option<u32>,
    pub throttled_rate: Option<&'static str>,
    pub no_playlist: bool,
    pub skip_certificate_check: bool,
    pub suppress_warnings: bool,
    /// Write straight to the output without `.part` files.
    pub no_part: bool,
    pub extra_args: &'static [&'static str],
}

pub const ACQUISITION_POLICIES: &[AcquisitionPolicy] = &[
    AcquisitionPolicy {
        profile: SourceProfile::Generic,
        kind: MediaKind::Video,
        concurrent_fragments: 4,
        buffer_size: "512K",
        http_chunk_size: "10M",
        retries: None,
        throttled_rate: Some("100K"),
        no_playlist: true,
        skip_certificate_check: true,
        suppress_warnings: false,
        no_part: false,
        extra_args: &[],
    },
    AcquisitionPolicy {
        profile: SourceProfile::Generic,
        kind: MediaKind::Audio,
        concurrent_fragments: 16,
        buffer_size: "2M",
        http_chunk_size: "10M",
        retries: Some(10),
        throttled_rate: None,
        no_playlist: true,
        skip_certificate_check: true,
        suppress_warnings: false,
        no_part: true,
        extra_args: &["--extractor-args", "youtube:player_client=android"],
    },
    AcquisitionPolicy {
        profile: SourceProfile::ShortForm,
        kind: MediaKind::Video,
        concurrent_fragments: 4,
        buffer_size: "512K",
        http_chunk_size: "10M",
        retries: None,
        throttled_rate: None,
        no_playlist: false,
        skip_certificate_check: false,
        suppress_warnings: true,
        no_part: false,
        extra_args: &[],
    },
    AcquisitionPolicy {
        profile: SourceProfile::ShortForm,
        kind: MediaKind::Audio,
        concurrent_fragments: 16,
        buffer_size: "2M",
        http_chunk_size: "10M",
        retries: Some(10),
        throttled_rate: None,
        no_playlist: false,
        skip_certificate_check: false,
        suppress_warnings: true,
        no_part: true,
        extra_args: &[],
    },
];

/// Returns the policy row for a profile and media kind.
pub fn policy_for(profile: SourceProfile, kind: MediaKind) -> &'static AcquisitionPolicy {
    ACQUISITION_POLICIES
        .iter()
        .find(|p| p.profile == profile && p.kind == kind)
        .unwrap_or(&ACQUISITION_POLICIES[0])
}

impl AcquisitionPolicy {
    /// Renders the policy as command-line flags.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.suppress_warnings {
            args.push("--no-warnings".to_string());
        }
        if self.no_playlist {
            args.push("--no-playlist".to_string());
        }
        if self.skip_certificate_check {
            args.push("--no-check-certificate".to_string());
        }

        args.extend([
            "--concurrent-fragments".to_string(),
            self.concurrent_fragments.to_string(),
            "--buffer-size".to_string(),
            self.buffer_size.to_string(),
            "--http-chunk-size".to_string(),
            self.http_chunk_size.to_string(),
        ]);

        if let Some(retries) = self.retries {
            args.extend([
                "--retries".to_string(),
                retries.to_string(),
                "--fragment-retries".to_string(),
                retries.to_string(),
            ]);
        }
        if let Some(rate) = self.throttled_rate {
            args.extend(["--throttled-rate".to_string(), rate.to_string()]);
        }
        if self.no_part {
            args.push("--no-part".to_string());
        }

        args.extend(self.extra_args.iter().map(|a| a.to_string()));
        args
    }
}
