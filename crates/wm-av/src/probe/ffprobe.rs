//! FFprobe-based [`MediaProbe`] implementation.
//!
//! Each query is one ffprobe invocation with a fixed flag pattern, printing a
//! bare value (`-of default=nw=1:nk=1`) or CSV rows (`-of csv=p=0`). Crop
//! detection runs ffmpeg's `cropdetect` over a window of the source and votes
//! on the rectangle it reports most often.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::types::SubtitleStream;
use super::MediaProbe;
use crate::command::{ProcessRunner, ToolCommand};
use crate::tools::{ToolConfig, ToolRegistry};

/// Start offset and duration (seconds) of the crop-detection window.
const CROP_WINDOW: (&str, &str) = ("300", "600");

static CROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"crop=([0-9]+:[0-9]+:[0-9]+:[0-9]+)").expect("valid regex"));

/// A prober backed by the `ffprobe` CLI.
#[derive(Clone)]
pub struct FfprobeProber {
    ffprobe: ToolConfig,
    ffmpeg: ToolConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for FfprobeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfprobeProber")
            .field("ffprobe", &self.ffprobe.path)
            .field("ffmpeg", &self.ffmpeg.path)
            .finish_non_exhaustive()
    }
}

impl FfprobeProber {
    /// Create a prober from discovered tools.
    ///
    /// # Errors
    ///
    /// Returns [`wm_core::Error::Tool`] when ffprobe or ffmpeg is missing.
    pub fn new(tools: &ToolRegistry, runner: Arc<dyn ProcessRunner>) -> wm_core::Result<Self> {
        Ok(Self {
            ffprobe: tools.require("ffprobe")?.clone(),
            ffmpeg: tools.require("ffmpeg")?.clone(),
            runner,
        })
    }

    fn entry_query(&self, path: &Path, selector: &str, entries: &str) -> ToolCommand {
        let mut cmd = self.ffprobe.command();
        cmd.path_arg(path);
        cmd.args(["-loglevel", "error"]);
        cmd.args(["-select_streams", selector]);
        cmd.args(["-show_entries", entries]);
        cmd.args(["-of", "default=nw=1:nk=1"]);
        cmd
    }

    async fn run_query(&self, path: &Path, cmd: ToolCommand) -> wm_core::Result<String> {
        let output = self.runner.run(&cmd).await.map_err(|e| {
            wm_core::Error::probe(path, format!("{} could not run: {e}", cmd.program_name()))
        })?;
        if !output.success() {
            return Err(wm_core::Error::probe(
                path,
                format!(
                    "`{}` failed ({}): {}",
                    cmd.render(),
                    output.status(),
                    output.stderr.trim()
                ),
            ));
        }
        Ok(output.stdout)
    }

    /// First line of a single-value query, or `None` if the selector matched
    /// nothing.
    async fn single_value(
        &self,
        path: &Path,
        selector: &str,
        entries: &str,
    ) -> wm_core::Result<Option<String>> {
        let cmd = self.entry_query(path, selector, entries);
        let stdout = self.run_query(path, cmd).await?;
        Ok(first_line(&stdout))
    }

    async fn required_u32(
        &self,
        path: &Path,
        selector: &str,
        entries: &str,
    ) -> wm_core::Result<u32> {
        let value = self
            .single_value(path, selector, entries)
            .await?
            .ok_or_else(|| wm_core::Error::probe(path, format!("no stream matches {selector}")))?;
        value.parse::<u32>().map_err(|_| {
            wm_core::Error::probe(path, format!("{entries} of {selector} is not a number: {value:?}"))
        })
    }
}

#[async_trait]
impl MediaProbe for FfprobeProber {
    async fn audio_channels(&self, path: &Path, index: u32) -> wm_core::Result<u32> {
        self.required_u32(path, &format!("a:{index}"), "stream=channels")
            .await
    }

    async fn audio_language(&self, path: &Path, index: u32) -> wm_core::Result<String> {
        Ok(self
            .single_value(path, &format!("a:{index}"), "stream_tags=language")
            .await?
            .unwrap_or_default())
    }

    async fn video_height(&self, path: &Path, index: u32) -> wm_core::Result<u32> {
        self.required_u32(path, &format!("v:{index}"), "stream=height")
            .await
    }

    async fn color_space(&self, path: &Path, index: u32) -> wm_core::Result<String> {
        Ok(self
            .single_value(path, &format!("v:{index}"), "stream=color_space")
            .await?
            .unwrap_or_default())
    }

    async fn crop_rect(&self, path: &Path) -> wm_core::Result<String> {
        let mut cmd = self.ffmpeg.command();
        cmd.args(["-ss", CROP_WINDOW.0, "-t", CROP_WINDOW.1, "-i"]);
        cmd.path_arg(path);
        cmd.args(["-vf", "cropdetect", "-an", "-f", "null", "-"]);

        tracing::info!("Detecting crop: {}", cmd.render());
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(wm_core::Error::probe(
                path,
                format!("cropdetect failed ({}): {}", output.status(), output.stderr.trim()),
            ));
        }
        most_common_crop(&output.diagnostics())
            .ok_or_else(|| wm_core::Error::probe(path, "cropdetect reported no crop rectangle"))
    }

    async fn subtitle_streams(&self, path: &Path) -> wm_core::Result<Vec<SubtitleStream>> {
        let mut cmd = self.ffprobe.command();
        cmd.path_arg(path);
        cmd.args(["-loglevel", "error"]);
        cmd.args(["-select_streams", "s"]);
        cmd.args(["-show_entries", "stream=codec_name:stream_tags=language"]);
        cmd.args(["-of", "csv=p=0"]);
        let stdout = self.run_query(path, cmd).await?;
        Ok(parse_subtitle_rows(&stdout))
    }

    async fn subtitle_codec(&self, path: &Path, index: u32) -> wm_core::Result<String> {
        let probed = self
            .single_value(path, &format!("s:{index}"), "stream=codec_name")
            .await?;
        match probed {
            Some(codec) => Ok(codec),
            None => codec_from_extension(path).ok_or_else(|| {
                wm_core::Error::probe(path, format!("no subtitle stream s:{index}"))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn first_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// The crop rectangle reported most often; ties go to the one seen first.
pub(crate) fn most_common_crop(diagnostics: &str) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, cap) in CROP_RE.captures_iter(diagnostics).enumerate() {
        let rect = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        counts.entry(rect).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(rect, _)| rect.to_string())
}

pub(crate) fn parse_subtitle_rows(stdout: &str) -> Vec<SubtitleStream> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, row)| {
            let mut fields = row.split(',');
            let codec = fields.next().unwrap_or_default().trim().to_string();
            let language = fields.next().unwrap_or_default().trim().to_string();
            SubtitleStream {
                index: i as u32,
                codec,
                language,
            }
        })
        .collect()
}

fn codec_from_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "srt" => Some("subrip".into()),
        "ass" | "ssa" => Some("ass".into()),
        "vtt" => Some("webvtt".into()),
        _ => None,
    }
}
