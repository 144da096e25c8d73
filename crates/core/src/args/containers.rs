//! Output container table.
//!
//! One row per supported `(media kind, extension)`. Adding a container means
//! adding a row here; the transcode argument builder has no per-container branches.

use crate::job::MediaKind;

/// Encoding recipe for one output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProfile {
    pub kind: MediaKind,
    pub extension: &'static str,
    /// Value for the transcoder's `-f` flag.
    pub muxer: &'static str,
    pub content_type: &'static str,
    pub video_codec: Option<&'static str>,
    pub audio_codec: &'static str,
    /// Encoder tuning placed after the video codec.
    pub video_flags: &'static [&'static str],
    /// Encoder tuning placed after the audio bitrate.
    pub audio_flags: &'static [&'static str],
    /// Muxer options placed before `-f`.
    pub muxer_flags: &'static [&'static str],
}

const X264_FLAGS: &[&str] = &["-preset", "veryfast", "-tune", "zerolatency", "-crf", "23"];

/// Audio bitrate used inside video containers.
pub const VIDEO_AUDIO_BITRATE: &str = "192k";

pub const CONTAINERS: &[ContainerProfile] = &[
    ContainerProfile {
        kind: MediaKind::Video,
        extension: "mp4",
        muxer: "mp4",
        content_type: "video/mp4",
        video_codec: Some("libx264"),
        audio_codec: "aac",
        video_flags: X264_FLAGS,
        audio_flags: &[],
        muxer_flags: &[
            "-movflags",
            "+frag_keyframe+empty_moov+faststart+default_base_moof",
        ],
    },
    ContainerProfile {
        kind: MediaKind::Video,
        extension: "webm",
        muxer: "webm",
        content_type: "video/webm",
        video_codec: Some("libvpx"),
        audio_codec: "libopus",
        video_flags: &[
            "-deadline", "realtime", "-cpu-used", "8", "-crf", "23", "-b:v", "2M",
        ],
        audio_flags: &[],
        muxer_flags: &[],
    },
    ContainerProfile {
        kind: MediaKind::Video,
        extension: "mkv",
        muxer: "matroska",
        content_type: "video/x-matroska",
        video_codec: Some("libx264"),
        audio_codec: "aac",
        video_flags: X264_FLAGS,
        audio_flags: &[],
        muxer_flags: &[],
    },
    ContainerProfile {
        kind: MediaKind::Audio,
        extension: "mp3",
        muxer: "mp3",
        content_type: "audio/mpeg",
        video_codec: None,
        audio_codec: "libmp3lame",
        video_flags: &[],
        audio_flags: &["-compression_level", "0", "-ar", "44100", "-ac", "2"],
        muxer_flags: &[],
    },
    ContainerProfile {
        kind: MediaKind::Audio,
        extension: "m4a",
        muxer: "ipod",
        content_type: "audio/mp4",
        video_codec: None,
        audio_codec: "aac",
        video_flags: &[],
        audio_flags: &[
            "-aac_coder", "fast", "-profile:a", "aac_low", "-ar", "44100", "-ac", "2",
        ],
        muxer_flags: &["-movflags", "+frag_keyframe+empty_moov+faststart"],
    },
    ContainerProfile {
        kind: MediaKind::Audio,
        extension: "opus",
        muxer: "opus",
        content_type: "audio/opus",
        video_codec: None,
        audio_codec: "libopus",
        video_flags: &[],
        audio_flags: &["-compression_level", "0", "-ar", "48000", "-ac", "2"],
        muxer_flags: &[],
    },
];

/// Default container extension for a media kind.
pub fn default_extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "mp4",
        MediaKind::Audio => "mp3",
    }
}

/// Looks up the container row, falling back to the kind's default container.
pub fn container_for(kind: MediaKind, extension: &str) -> &'static ContainerProfile {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    find(kind, &extension)
        .or_else(|| find(kind, default_extension(kind)))
        .unwrap_or(&CONTAINERS[0])
}

fn find(kind: MediaKind, extension: &str) -> Option<&'static ContainerProfile> {
    CONTAINERS
        .iter()
        .find(|c| c.kind == kind && c.extension == extension)
}

/// Supported extensions for a media kind, in table order.
pub fn extensions(kind: MediaKind) -> Vec<&'static str> {
    CONTAINERS
        .iter()
        .filter(|c| c.kind == kind)
        .map(|c| c.extension)
        .collect()
}
