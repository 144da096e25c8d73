//! Quality selector tokens: `best`, `<height>p` and `<bitrate>k`.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fmt;

use crate::job::MediaKind;

static SELECTOR_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\d{1,5})([pk])$").ok());

/// Bitrate used for audio when no cap is requested.
pub const BEST_AUDIO_BITRATE_KBPS: u32 = 320;

/// Parsed quality selector.
///
/// Parsing never fails: malformed, zero, or kind-mismatched tokens become `Best`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitySelector {
    Best,
    /// Cap on video height in pixels.
    MaxHeight(u32),
    /// Cap on audio bitrate in kbps.
    MaxBitrate(u32),
}

impl QualitySelector {
    /// Parses a selector token for the given media kind.
    pub fn parse(token: &str, kind: MediaKind) -> Self {
        let token = token.trim().to_ascii_lowercase();
        let Some(caps) = SELECTOR_RE.as_ref().and_then(|re| re.captures(&token)) else {
            return QualitySelector::Best;
        };

        let value = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        if value == 0 {
            return QualitySelector::Best;
        }

        match (caps.get(2).map(|m| m.as_str()), kind) {
            (Some("p"), MediaKind::Video) => QualitySelector::MaxHeight(value),
            (Some("k"), MediaKind::Audio) => QualitySelector::MaxBitrate(value),
            _ => QualitySelector::Best,
        }
    }

    /// Audio bitrate argument for the transcoder (`192k`, `320k`, ...).
    pub fn audio_bitrate(&self) -> String {
        match self {
            QualitySelector::MaxBitrate(kbps) => format!("{}k", kbps),
            _ => format!("{}k", BEST_AUDIO_BITRATE_KBPS),
        }
    }

    pub fn max_height(&self) -> Option<u32> {
        match self {
            QualitySelector::MaxHeight(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for QualitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualitySelector::Best => f.write_str("best"),
            QualitySelector::MaxHeight(h) => write!(f, "{}p", h),
            QualitySelector::MaxBitrate(k) => write!(f, "{}k", k),
        }
    }
}
