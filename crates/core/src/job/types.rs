//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::args::SourceProfile;

/// Kind of media requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind: {}", other)),
        }
    }
}

/// Lifecycle status of a job.
///
/// Status only moves forward: `created → acquiring → streaming → {completed | failed}`.
/// `failed` is reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Acquiring,
    Streaming,
    Completed,
    Failed,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Created,
        JobStatus::Acquiring,
        JobStatus::Streaming,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Acquiring => "acquiring",
            JobStatus::Streaming => "streaming",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Acquiring => 1,
            JobStatus::Streaming => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle moving forward.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// A single stream request tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// URL handed to the acquisition tool.
    pub source_url: String,
    pub media_kind: MediaKind,
    /// Quality token as requested (`best`, `720p`, `128k`).
    pub quality: String,
    /// Output container extension.
    pub extension: String,
    /// Sanitized display title, empty until resolved.
    pub title: String,
    pub source_profile: SourceProfile,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
    /// Bytes delivered to the client, recorded on the terminal transition.
    pub bytes_streamed: u64,
    /// Diagnostic message for failed or partially delivered jobs.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_transitions() {
        assert!(JobStatus::Created.can_transition_to(JobStatus::Acquiring));
        assert!(JobStatus::Acquiring.can_transition_to(JobStatus::Streaming));
        assert!(JobStatus::Streaming.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Streaming.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Created.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_status_rejects_backward_and_terminal_transitions() {
        assert!(!JobStatus::Streaming.can_transition_to(JobStatus::Acquiring));
        assert!(!JobStatus::Acquiring.can_transition_to(JobStatus::Acquiring));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!("audio".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("gif".parse::<MediaKind>().is_err());
    }
}
