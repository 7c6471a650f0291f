//! Stream Specification Builder.
//!
//! A [`StreamSpec`] is the immutable description of one stream to produce:
//! its variant, the source stream index, and four ordered directive groups
//! (selection, filter, encoder, metadata). Specs are built by
//! [`StreamSpec::build`], a pure function of its inputs that dispatches
//! through a per-variant table of builder functions. Nothing here runs a
//! process.

mod audio;
mod subtitle;
mod video;

use std::fmt;
use std::path::PathBuf;

use wm_core::config::{LoudnessConfig, SubtitleConfig};
use wm_core::StreamRole;

use crate::loudness::Measurement;

pub use video::{is_hdr, tile_columns};

/// The closed set of stream variants the pipeline knows how to build.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// Weighted stereo fold-down of a multichannel track, lossless PCM.
    StereoDownmix,
    /// Loudness analysis only; output is discarded.
    NormalizePass1,
    /// Loudness correction with first-pass measurements, lossless PCM.
    NormalizePass2(Measurement),
    Opus,
    Aac,
    /// Opus encode of a normalized stereo downmix.
    OpusDownmix,
    /// AAC encode of a normalized stereo downmix.
    AacDownmix,
    WebVtt,
    H264,
    Vp9,
}

impl Variant {
    pub fn role(&self) -> StreamRole {
        match self {
            Self::WebVtt => StreamRole::Subtitle,
            Self::H264 | Self::Vp9 => StreamRole::Video,
            _ => StreamRole::Audio,
        }
    }

    /// Short tag used in logs and errors.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StereoDownmix => "stereo-downmix",
            Self::NormalizePass1 => "normalize-pass1",
            Self::NormalizePass2(_) => "normalize-pass2",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::OpusDownmix => "opus-downmix",
            Self::AacDownmix => "aac-downmix",
            Self::WebVtt => "webvtt",
            Self::H264 => "h264",
            Self::Vp9 => "vp9",
        }
    }

    /// Encoded in two numbered passes sharing a pass log.
    pub fn is_two_pass(&self) -> bool {
        matches!(self, Self::Vp9)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A subtitle to burn into the picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnIn {
    /// File holding the subtitle: the source itself or an external file.
    pub file: PathBuf,
    /// Subtitle stream index within `file`, when it holds more than one.
    pub stream: Option<u32>,
    /// Probed codec name (`subrip`, `ass`, ...).
    pub codec: String,
}

/// Source properties a variant may require.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbedProps {
    pub channels: Option<u32>,
    /// Three-letter tag, empty when untagged.
    pub language: String,
    pub height: Option<u32>,
    pub color_space: String,
    /// Detected crop rectangle (`W:H:X:Y`), when cropping was requested.
    pub crop: Option<String>,
    pub burn_in: Option<BurnIn>,
}

/// Encoder settings that are not properties of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSettings {
    pub crf: u32,
    pub threads: u32,
    pub denoise: bool,
    /// Downscale target; H.264 falls back to 1080 when unset.
    pub max_height: Option<u32>,
    pub loudness: LoudnessConfig,
    pub subtitle_style: SubtitleConfig,
}

impl Default for SpecSettings {
    fn default() -> Self {
        let encode = wm_core::config::EncodeConfig::default();
        Self {
            crf: encode.crf,
            threads: encode.threads,
            denoise: false,
            max_height: None,
            loudness: LoudnessConfig::default(),
            subtitle_style: SubtitleConfig::default(),
        }
    }
}

/// Everything a directive builder sees.
pub(crate) struct BuildInput<'a> {
    pub variant: &'a Variant,
    pub stream_index: u32,
    pub props: &'a ProbedProps,
    pub settings: &'a SpecSettings,
}

type Directive = fn(&BuildInput<'_>) -> wm_core::Result<Vec<String>>;

/// One row of the dispatch table.
struct Directives {
    selection: Directive,
    filter: Directive,
    encode: Directive,
    metadata: Directive,
}

fn directives(variant: &Variant) -> Directives {
    match variant {
        Variant::StereoDownmix => Directives {
            selection: audio::downmix_selection,
            filter: audio::downmix_filter,
            encode: audio::pcm_encode,
            metadata: audio::downmix_metadata,
        },
        Variant::NormalizePass1 => Directives {
            selection: audio::index_selection,
            filter: audio::pass1_filter,
            encode: none,
            metadata: none,
        },
        Variant::NormalizePass2(_) => Directives {
            selection: audio::index_selection,
            filter: audio::pass2_filter,
            encode: audio::pass2_encode,
            metadata: audio::normalized_metadata,
        },
        Variant::Opus | Variant::OpusDownmix => Directives {
            selection: audio::bucket_selection,
            filter: audio::bucket_filter,
            encode: audio::opus_encode,
            metadata: audio::lossy_metadata,
        },
        Variant::Aac | Variant::AacDownmix => Directives {
            selection: audio::bucket_selection,
            filter: audio::bucket_filter,
            encode: audio::aac_encode,
            metadata: audio::lossy_metadata,
        },
        Variant::WebVtt => Directives {
            selection: subtitle::selection,
            filter: none,
            encode: subtitle::encode,
            metadata: subtitle::metadata,
        },
        Variant::H264 => Directives {
            selection: video::selection,
            filter: video::filter,
            encode: video::h264_encode,
            metadata: video::h264_metadata,
        },
        Variant::Vp9 => Directives {
            selection: video::selection,
            filter: video::filter,
            encode: video::vp9_encode,
            metadata: video::vp9_metadata,
        },
    }
}

fn none(_: &BuildInput<'_>) -> wm_core::Result<Vec<String>> {
    Ok(Vec::new())
}

/// Immutable description of one stream to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    variant: Variant,
    input: PathBuf,
    stream_index: u32,
    selection: Vec<String>,
    filter: Vec<String>,
    encode: Vec<String>,
    metadata: Vec<String>,
}

impl StreamSpec {
    /// Build the directive groups for `variant` reading stream
    /// `stream_index` of `input`.
    ///
    /// # Errors
    ///
    /// [`wm_core::Error::UnsupportedVariant`] when `props` lacks a value the
    /// variant needs or holds one outside its tables;
    /// [`wm_core::Error::UnsupportedSubtitle`] when a burn-in codec has no
    /// filter syntax.
    pub fn build(
        variant: Variant,
        input: impl Into<PathBuf>,
        stream_index: u32,
        props: &ProbedProps,
        settings: &SpecSettings,
    ) -> wm_core::Result<Self> {
        let table = directives(&variant);
        let ctx = BuildInput {
            variant: &variant,
            stream_index,
            props,
            settings,
        };
        let selection = (table.selection)(&ctx)?;
        let filter = (table.filter)(&ctx)?;
        let encode = (table.encode)(&ctx)?;
        let metadata = (table.metadata)(&ctx)?;
        Ok(Self {
            variant,
            input: input.into(),
            stream_index,
            selection,
            filter,
            encode,
            metadata,
        })
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn role(&self) -> StreamRole {
        self.variant.role()
    }

    pub fn input(&self) -> &std::path::Path {
        &self.input
    }

    pub fn stream_index(&self) -> u32 {
        self.stream_index
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn filter(&self) -> &[String] {
        &self.filter
    }

    pub fn encode(&self) -> &[String] {
        &self.encode
    }

    pub fn metadata(&self) -> &[String] {
        &self.metadata
    }
}
