//! Media-domain enums for stream roles, channel buckets, profiles, and
//! language display names.
//!
//! All enums serialize in lowercase (via `serde(rename_all = "lowercase")`) and
//! implement `Display` manually for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StreamRole
// ---------------------------------------------------------------------------

/// The logical kind of an elementary stream (and of a muxed track).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelBucket
// ---------------------------------------------------------------------------

/// Channel-count buckets with their own directive tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBucket {
    Mono,
    Stereo,
    /// Four channels; encoded as stereo.
    Quad,
    #[serde(rename = "5.1")]
    Surround51,
    #[serde(rename = "7.1")]
    Surround71,
}

impl ChannelBucket {
    /// Map a probed channel count to its bucket. Counts outside
    /// {1, 2, 4, 6, 8} have no bucket.
    pub fn from_count(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            4 => Some(Self::Quad),
            6 => Some(Self::Surround51),
            8 => Some(Self::Surround71),
            _ => None,
        }
    }

    /// Multichannel buckets route through a filter graph and are selected
    /// by its output pad rather than by track index.
    pub fn uses_filter_pad(self) -> bool {
        matches!(self, Self::Surround51 | Self::Surround71)
    }
}

impl fmt::Display for ChannelBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
            Self::Quad => write!(f, "quad"),
            Self::Surround51 => write!(f, "5.1"),
            Self::Surround71 => write!(f, "7.1"),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Delivery profile: which codecs and container the final artifact uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// VP9 two-pass video, Opus audio, WebVTT subtitles in WebM.
    Webm,
    /// H.264 High@4.1 video and a normalized AAC downmix in MP4.
    Chromecast,
}

impl Profile {
    /// Suffix appended to the output base name.
    pub fn output_suffix(self) -> &'static str {
        match self {
            Self::Webm => ".webm",
            Self::Chromecast => ".chromecast.mp4",
        }
    }

    /// Default profile for a media kind.
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Movie => Self::Chromecast,
            MediaKind::Episode => Self::Webm,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Webm => write!(f, "webm"),
            Self::Chromecast => write!(f, "chromecast"),
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webm" | "vp9" => Ok(Self::Webm),
            "chromecast" | "mp4" | "h264" => Ok(Self::Chromecast),
            other => Err(format!("unknown profile '{other}' (expected webm or chromecast)")),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Whether an input is a movie or a TV episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Episode => write!(f, "episode"),
        }
    }
}

// ---------------------------------------------------------------------------
// Languages
// ---------------------------------------------------------------------------

/// Display name for a three-letter language tag, used in track titles.
///
/// An empty tag is treated as English; `und` has no display name.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "" | "eng" => "English",
        "chi" | "zho" => "Chinese",
        "fre" | "fra" => "French",
        "ger" | "deu" => "German",
        "jpn" => "Japanese",
        "spa" | "spn" => "Spanish",
        _ => "",
    }
}

/// Language tag written into stream metadata. Empty tags become `eng`.
pub fn language_tag(code: &str) -> &str {
    if code.is_empty() {
        "eng"
    } else {
        code
    }
}
