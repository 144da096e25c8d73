//! Argument builders for the acquisition and transcoding tools.
//!
//! Everything here is pure: the same inputs always produce the same argv and
//! nothing can fail. Unknown quality tokens and containers degrade to the
//! documented defaults instead of erroring.
//!
//! # Example
//!
//! ```ignore
//! use tubepipe_core::args::{build_acquisition_args, build_transcode_args, SourceProfile};
//! use tubepipe_core::MediaKind;
//!
//! let url = "https://www.youtube.com/watch?v=abc";
//! let acquire = build_acquisition_args(url, MediaKind::Video, "720p", SourceProfile::detect(url));
//! let transcode = build_transcode_args(MediaKind::Video, "webm", "720p");
//! ```

mod containers;
mod profile;
mod quality;

pub use containers::{
    container_for, default_extension, extensions, ContainerProfile, CONTAINERS,
    VIDEO_AUDIO_BITRATE,
};
pub use profile::{policy_for, AcquisitionPolicy, SourceProfile, ACQUISITION_POLICIES};
pub use quality::{QualitySelector, BEST_AUDIO_BITRATE_KBPS};

use crate::job::MediaKind;

/// Quality tokens offered to clients, per media kind.
pub const VIDEO_QUALITIES: &[&str] = &[
    "144p", "240p", "360p", "480p", "720p", "1080p", "1440p", "2160p", "best",
];
pub const AUDIO_QUALITIES: &[&str] = &["64k", "128k", "192k", "256k", "320k", "best"];

/// Format selector passed to the acquisition tool's `-f` flag.
pub fn format_selector(kind: MediaKind, quality: QualitySelector, profile: SourceProfile) -> String {
    match (kind, profile, quality.max_height()) {
        (MediaKind::Video, SourceProfile::Generic, Some(h)) => {
            format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
        }
        (MediaKind::Video, SourceProfile::Generic, None) => "bestvideo+bestaudio/best".to_string(),
        (MediaKind::Video, SourceProfile::ShortForm, Some(h)) => format!("best[height<={h}]/best"),
        (MediaKind::Audio, SourceProfile::Generic, _) => {
            "bestaudio[ext=m4a]/bestaudio/best".to_string()
        }
        (_, SourceProfile::ShortForm, _) => "best".to_string(),
    }
}

/// Builds the acquisition argv: stream the selected format to stdout.
pub fn build_acquisition_args(
    url: &str,
    kind: MediaKind,
    quality: &str,
    profile: SourceProfile,
) -> Vec<String> {
    let selector = QualitySelector::parse(quality, kind);
    let policy = policy_for(profile, kind);

    let mut args = vec!["-f".to_string(), format_selector(kind, selector, profile)];
    args.extend(policy.to_args());
    args.extend(["-o".to_string(), "-".to_string(), url.to_string()]);
    args
}

/// Builds the metadata-only argv used to look up a display title.
pub fn build_title_args(url: &str, profile: SourceProfile) -> Vec<String> {
    let mut args = vec!["--get-title".to_string()];
    match profile {
        SourceProfile::Generic => {
            args.extend(["--no-playlist".to_string(), "--skip-download".to_string()])
        }
        SourceProfile::ShortForm => args.push("--no-warnings".to_string()),
    }
    args.push(url.to_string());
    args
}

/// Builds the transcoder argv: raw media on stdin, encoded container on stdout.
pub fn build_transcode_args(kind: MediaKind, extension: &str, quality: &str) -> Vec<String> {
    let container = container_for(kind, extension);
    let selector = QualitySelector::parse(quality, kind);

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-i", "pipe:0"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    match container.video_codec {
        Some(video_codec) if kind == MediaKind::Video => {
            args.extend(["-c:v".to_string(), video_codec.to_string()]);
            args.extend(container.video_flags.iter().map(|s| s.to_string()));

            // Downscale only; smaller sources keep their size.
            if let Some(height) = selector.max_height() {
                args.extend(["-vf".to_string(), format!("scale=-2:'min({},ih)'", height)]);
            }

            args.extend([
                "-c:a".to_string(),
                container.audio_codec.to_string(),
                "-b:a".to_string(),
                VIDEO_AUDIO_BITRATE.to_string(),
            ]);
        }
        _ => {
            args.extend([
                "-vn".to_string(),
                "-c:a".to_string(),
                container.audio_codec.to_string(),
                "-b:a".to_string(),
                selector.audio_bitrate(),
            ]);
        }
    }

    args.extend(container.audio_flags.iter().map(|s| s.to_string()));
    args.extend(container.muxer_flags.iter().map(|s| s.to_string()));
    args.extend(
        [
            "-max_muxing_queue_size",
            "9999",
            "-f",
            container.muxer,
            "-threads",
            "0",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    args
}
