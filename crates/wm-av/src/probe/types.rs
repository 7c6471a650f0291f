//! Types returned by the probe adapter.

use serde::{Deserialize, Serialize};

/// A subtitle stream in the source, addressed by its index among subtitle
/// streams (`s:{index}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec: String,
    /// Empty when untagged.
    pub language: String,
}

impl SubtitleStream {
    /// English or untagged.
    pub fn is_english(&self) -> bool {
        matches!(self.language.as_str(), "eng" | "en" | "")
    }
}

/// Text subtitle codecs that can be converted to WebVTT.
pub fn is_text_subtitle(codec: &str) -> bool {
    matches!(codec, "subrip" | "srt" | "ass" | "ssa" | "webvtt" | "mov_text" | "text")
}
