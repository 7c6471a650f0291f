//! Probe adapter: narrow queries about a media artifact.
//!
//! [`MediaProbe`] is the seam the pipeline depends on; [`FfprobeProber`]
//! answers it by shelling out to ffprobe (and ffmpeg's `cropdetect` for crop
//! rectangles).

pub mod ffprobe;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

pub use self::ffprobe::FfprobeProber;
pub use self::types::{is_text_subtitle, SubtitleStream};

/// Queries about one artifact. Pure reads; nothing is modified.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Channel count of audio stream `a:{index}`.
    async fn audio_channels(&self, path: &Path, index: u32) -> wm_core::Result<u32>;

    /// Language tag of audio stream `a:{index}`; empty when untagged.
    async fn audio_language(&self, path: &Path, index: u32) -> wm_core::Result<String>;

    /// Height in pixels of video stream `v:{index}`.
    async fn video_height(&self, path: &Path, index: u32) -> wm_core::Result<u32>;

    /// Color space tag of video stream `v:{index}`; empty when unknown.
    async fn color_space(&self, path: &Path, index: u32) -> wm_core::Result<String>;

    /// Most frequently detected crop rectangle as `W:H:X:Y`.
    async fn crop_rect(&self, path: &Path) -> wm_core::Result<String>;

    /// All subtitle streams with their relative indices.
    async fn subtitle_streams(&self, path: &Path) -> wm_core::Result<Vec<SubtitleStream>>;

    /// Codec name of subtitle stream `s:{index}`.
    async fn subtitle_codec(&self, path: &Path, index: u32) -> wm_core::Result<String>;
}
