//! Per-file pipeline: probe the source, plan every stream, run the encodes,
//! normalize the downmix and mux the result into place.
//!
//! Planning builds every [`StreamSpec`] that does not depend on a loudness
//! measurement before any process starts, so a source the tables cannot
//! handle is rejected without leaving partial output behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use wm_av::{Artifact, MediaProbe, ProcessRunner, ToolConfig, Workspace};
use wm_core::{ChannelBucket, Profile, StreamRole};

use crate::job::{EncodeJob, JobGraph, JobOutput};
use crate::loudness::LoudnessEngine;
use crate::mux::{MuxPlan, MuxTrack, Muxer, WrapperVariant};
use crate::runner::JobRunner;
use crate::spec::{BurnIn, ProbedProps, SpecSettings, StreamSpec, Variant};

/// Where soft (or burned-in) subtitles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleMode {
    /// First English subtitle stream of the source.
    #[default]
    Embedded,
    /// `<stem>.srt` next to the source.
    External,
    None,
}

/// Per-file encode options.
#[derive(Debug, Clone)]
pub struct FileOptions {
    pub profile: Profile,
    pub subtitles: SubtitleMode,
    /// Burn subtitles into the picture instead of carrying a soft track.
    pub burn_in: bool,
    pub crop: bool,
    pub settings: SpecSettings,
}

impl FileOptions {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            subtitles: SubtitleMode::default(),
            burn_in: false,
            crop: false,
            settings: SpecSettings::default(),
        }
    }
}

/// Container title and summary written by the mux.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Titles {
    pub title: String,
    pub summary: String,
}

/// A soft subtitle track and the file it is extracted from.
#[derive(Debug, Clone)]
pub struct SoftSubtitle {
    pub source: PathBuf,
    pub spec: StreamSpec,
}

/// Everything decided about one input before encoding.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub input: PathBuf,
    pub profile: Profile,
    pub wrapper: WrapperVariant,
    pub audio_props: ProbedProps,
    pub video: StreamSpec,
    /// Full-layout audio track; absent for the streaming wrapper.
    pub audio: Option<StreamSpec>,
    /// Lossy encode of the normalized stereo downmix.
    pub downmix: Option<StreamSpec>,
    pub subtitle: Option<SoftSubtitle>,
}

impl FilePlan {
    /// Human-readable summary for dry runs.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!("input:   {}", self.input.display()),
            format!("profile: {}  wrapper: {}", self.profile, self.wrapper),
        ];
        let mut push = |spec: &StreamSpec| {
            let groups = [spec.filter(), spec.selection(), spec.encode(), spec.metadata()];
            let tokens: Vec<&str> = groups.iter().flat_map(|g| g.iter().map(String::as_str)).collect();
            lines.push(format!("  [{}] {}", spec.variant(), tokens.join(" ")));
        };
        push(&self.video);
        if let Some(spec) = &self.audio {
            push(spec);
        }
        if let Some(spec) = &self.downmix {
            push(spec);
        }
        if let Some(sub) = &self.subtitle {
            push(&sub.spec);
        }
        if self.downmix.is_some() {
            lines.push("  downmix is loudness-normalized before encoding".into());
        }
        lines
    }

    fn container_extension(&self) -> &'static str {
        match self.profile {
            Profile::Webm => "webm",
            Profile::Chromecast => "mp4",
        }
    }
}

/// Runs one input file from probe to final container.
pub struct FilePipeline {
    probe: Arc<dyn MediaProbe>,
    runner: JobRunner,
    muxer: Muxer,
}

impl std::fmt::Debug for FilePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePipeline")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl FilePipeline {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        ffmpeg: ToolConfig,
        process: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            probe,
            runner: JobRunner::new(ffmpeg.clone(), process.clone()),
            muxer: Muxer::new(ffmpeg, process),
        }
    }

    /// Probe `input` and build its plan.
    ///
    /// # Errors
    ///
    /// Probe failures, [`wm_core::Error::UnsupportedVariant`] for a channel
    /// layout outside the tables, and [`wm_core::Error::UnsupportedSubtitle`]
    /// for a burn-in codec with no filter syntax.
    pub async fn plan(&self, input: &Path, opts: &FileOptions) -> wm_core::Result<FilePlan> {
        let channels = self.probe.audio_channels(input, 0).await?;
        let audio_props = ProbedProps {
            channels: Some(channels),
            language: self.probe.audio_language(input, 0).await?,
            ..Default::default()
        };
        let bucket = ChannelBucket::from_count(channels).ok_or_else(|| {
            wm_core::Error::unsupported("audio", format!("no directive table for {channels} channels"))
        })?;

        let mut video_props = ProbedProps {
            height: Some(self.probe.video_height(input, 0).await?),
            color_space: self.probe.color_space(input, 0).await?,
            ..Default::default()
        };
        if opts.crop {
            video_props.crop = Some(self.probe.crop_rect(input).await?);
        }
        if opts.burn_in {
            video_props.burn_in = self.burn_in_source(input, opts.subtitles).await?;
        }

        let subtitle = match (opts.profile, opts.burn_in) {
            (Profile::Webm, false) => self.soft_subtitle(input, opts).await?,
            _ => None,
        };
        let wrapper = WrapperVariant::choose(opts.profile, bucket, subtitle.is_some());
        let settings = &opts.settings;

        let video_variant = match opts.profile {
            Profile::Webm => Variant::Vp9,
            Profile::Chromecast => Variant::H264,
        };
        let video = StreamSpec::build(video_variant, input, 0, &video_props, settings)?;

        let audio = match wrapper {
            WrapperVariant::Streaming => None,
            _ => Some(StreamSpec::build(Variant::Opus, input, 0, &audio_props, settings)?),
        };

        let downmix = if wrapper.has_downmix() {
            let variant = match opts.profile {
                Profile::Webm => Variant::OpusDownmix,
                Profile::Chromecast => Variant::AacDownmix,
            };
            let stereo = ProbedProps {
                channels: Some(2),
                language: audio_props.language.clone(),
                ..Default::default()
            };
            Some(StreamSpec::build(variant, "a0.normalized.wav", 0, &stereo, settings)?)
        } else {
            None
        };

        Ok(FilePlan {
            input: input.to_path_buf(),
            profile: opts.profile,
            wrapper,
            audio_props,
            video,
            audio,
            downmix,
            subtitle,
        })
    }

    async fn burn_in_source(&self, input: &Path, mode: SubtitleMode) -> wm_core::Result<Option<BurnIn>> {
        match mode {
            SubtitleMode::None => Ok(None),
            SubtitleMode::External => {
                let file = external_subtitle(input);
                if !file.exists() {
                    tracing::warn!("no subtitle file {} to burn in", file.display());
                    return Ok(None);
                }
                let codec = self.probe.subtitle_codec(&file, 0).await?;
                Ok(Some(BurnIn {
                    file,
                    stream: None,
                    codec,
                }))
            }
            SubtitleMode::Embedded => {
                let streams = self.probe.subtitle_streams(input).await?;
                let Some(stream) = streams.into_iter().find(|s| s.is_english()) else {
                    tracing::warn!("no English subtitle stream to burn in");
                    return Ok(None);
                };
                Ok(Some(BurnIn {
                    file: input.to_path_buf(),
                    stream: Some(stream.index),
                    codec: stream.codec,
                }))
            }
        }
    }

    async fn soft_subtitle(&self, input: &Path, opts: &FileOptions) -> wm_core::Result<Option<SoftSubtitle>> {
        let (source, index) = match opts.subtitles {
            SubtitleMode::None => return Ok(None),
            SubtitleMode::External => {
                let file = external_subtitle(input);
                if !file.exists() {
                    tracing::warn!("external subtitle {} not found; continuing without", file.display());
                    return Ok(None);
                }
                (file, 0)
            }
            SubtitleMode::Embedded => {
                let streams = self.probe.subtitle_streams(input).await?;
                let Some(stream) = streams.iter().find(|s| s.is_english()) else {
                    return Ok(None);
                };
                if !wm_av::probe::is_text_subtitle(&stream.codec) {
                    tracing::warn!(
                        "subtitle stream s:{} is {}; image subtitles cannot become WebVTT",
                        stream.index,
                        stream.codec
                    );
                    return Ok(None);
                }
                (input.to_path_buf(), stream.index)
            }
        };
        let spec = StreamSpec::build(
            Variant::WebVtt,
            &source,
            index,
            &ProbedProps::default(),
            &opts.settings,
        )?;
        Ok(Some(SoftSubtitle { source, spec }))
    }

    /// Run every encode in `plan`, mux them and move the container to `dest`.
    ///
    /// A failed encode drops the scratch directory with everything in it. A
    /// failed mux keeps it for inspection and the error names its path.
    pub async fn encode(
        &self,
        plan: &FilePlan,
        titles: &Titles,
        settings: &SpecSettings,
        dest: &Path,
    ) -> wm_core::Result<PathBuf> {
        let output_dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let ws = Workspace::new(&plan.input, output_dir)?;
        let mut graph = JobGraph::new();
        let mut tracks = Vec::new();
        let ext = plan.container_extension();

        let video_out = ws.intermediate(&format!("v0.{ext}"));
        let mut job = EncodeJob::new(
            "video",
            ws.source(),
            plan.video.clone(),
            JobOutput::Artifact(video_out.clone()),
        );
        if plan.video.variant().is_two_pass() {
            job = job.with_passlog(ws.temp_file("v0"));
        }
        let id = graph.add(job)?;
        self.runner.run(&mut graph, id, &ws).await?;
        tracks.push(MuxTrack::new(video_out, StreamRole::Video));

        if let Some(spec) = &plan.audio {
            let out = ws.intermediate("a0.opus");
            let id = graph.add(EncodeJob::new(
                "audio",
                ws.source(),
                spec.clone(),
                JobOutput::Artifact(out.clone()),
            ))?;
            self.runner.run(&mut graph, id, &ws).await?;
            tracks.push(MuxTrack::new(out, StreamRole::Audio));
        }

        if let Some(spec) = &plan.downmix {
            let engine = LoudnessEngine::new(&self.runner, settings);
            let normalized = engine
                .normalize(&mut graph, &ws, ws.source(), 0, &plan.audio_props, "a0")
                .await?;
            let name = match plan.profile {
                Profile::Webm => "a0.downmix.opus",
                Profile::Chromecast => "a0.downmix.m4a",
            };
            let out = ws.intermediate(name);
            let id = graph.add(
                EncodeJob::new(
                    "downmix",
                    normalized.artifact,
                    spec.clone(),
                    JobOutput::Artifact(out.clone()),
                )
                .after([normalized.producer]),
            )?;
            self.runner.run(&mut graph, id, &ws).await?;
            tracks.push(MuxTrack::new(out, StreamRole::Audio));
        }

        if let Some(sub) = &plan.subtitle {
            let out = ws.intermediate("s0.vtt");
            let id = graph.add(EncodeJob::new(
                "subtitle",
                Artifact::owned_by_caller(&sub.source),
                sub.spec.clone(),
                JobOutput::Artifact(out.clone()),
            ))?;
            self.runner.run(&mut graph, id, &ws).await?;
            tracks.push(MuxTrack::new(out, StreamRole::Subtitle));
        }

        let mux_plan = MuxPlan {
            variant: plan.wrapper,
            output: ws.output(ext),
            title: titles.title.clone(),
            summary: titles.summary.clone(),
            tracks,
        };
        match self.muxer.mux(&mux_plan, &ws).await {
            Ok(muxed) => {
                let done = ws.finalize_file(&muxed, dest)?;
                tracing::info!("wrote {}", done.display());
                Ok(done)
            }
            Err(wm_core::Error::MuxFailed {
                reason,
                command,
                diagnostics,
            }) => {
                let kept = ws.preserve();
                Err(wm_core::Error::MuxFailed {
                    reason: format!("{reason} (intermediates kept in {})", kept.display()),
                    command,
                    diagnostics,
                })
            }
            Err(other) => Err(other),
        }
    }
}

/// `<stem>.srt` beside `input`.
pub fn external_subtitle(input: &Path) -> PathBuf {
    input.with_extension("srt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use async_trait::async_trait;
    use std::time::Duration;
    use wm_av::SubtitleStream;
    use wm_core::error::ErrorKind;

    struct FakeProbe {
        channels: u32,
        subtitles: Vec<SubtitleStream>,
    }

    #[async_trait]
    impl MediaProbe for FakeProbe {
        async fn audio_channels(&self, _: &Path, _: u32) -> wm_core::Result<u32> {
            Ok(self.channels)
        }
        async fn audio_language(&self, _: &Path, _: u32) -> wm_core::Result<String> {
            Ok("eng".into())
        }
        async fn video_height(&self, _: &Path, _: u32) -> wm_core::Result<u32> {
            Ok(2160)
        }
        async fn color_space(&self, _: &Path, _: u32) -> wm_core::Result<String> {
            Ok("bt709".into())
        }
        async fn crop_rect(&self, _: &Path) -> wm_core::Result<String> {
            Ok("3840:1600:0:280".into())
        }
        async fn subtitle_streams(&self, _: &Path) -> wm_core::Result<Vec<SubtitleStream>> {
            Ok(self.subtitles.clone())
        }
        async fn subtitle_codec(&self, _: &Path, _: u32) -> wm_core::Result<String> {
            Ok("subrip".into())
        }
    }

    fn sub(index: u32, codec: &str, language: &str) -> SubtitleStream {
        SubtitleStream {
            index,
            codec: codec.into(),
            language: language.into(),
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        input: PathBuf,
        fake: Arc<ScriptedRunner>,
        pipeline: FilePipeline,
    }

    fn fixture(channels: u32, subtitles: Vec<SubtitleStream>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("show.s01e02.mkv");
        std::fs::write(&input, b"source").unwrap();
        let fake = Arc::new(ScriptedRunner::default());
        let ffmpeg = ToolConfig {
            name: "ffmpeg".into(),
            path: "ffmpeg".into(),
            timeout: Duration::from_secs(5),
        };
        let probe = Arc::new(FakeProbe { channels, subtitles });
        let pipeline = FilePipeline::new(probe, ffmpeg, fake.clone());
        Fixture {
            dir,
            input,
            fake,
            pipeline,
        }
    }

    fn titles() -> Titles {
        Titles {
            title: "Show - S01E02 - Pilot".into(),
            summary: "Things happen.".into(),
        }
    }

    fn scratch_dirs(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".webmify-"))
            .count()
    }

    #[tokio::test]
    async fn surround_with_subtitles_end_to_end() {
        let f = fixture(6, vec![sub(0, "subrip", "jpn"), sub(1, "subrip", "eng")]);
        let opts = FileOptions::new(Profile::Webm);
        let plan = f.pipeline.plan(&f.input, &opts).await.unwrap();
        assert_eq!(plan.wrapper, WrapperVariant::MultiChannelSubtitle);
        assert_eq!(plan.subtitle.as_ref().unwrap().spec.selection(), ["-map", "0:s:1"]);

        let dest = f.dir.path().join("show.s01e02.webm");
        let out = f
            .pipeline
            .encode(&plan, &titles(), &opts.settings, &dest)
            .await
            .unwrap();
        assert_eq!(out, dest);
        assert!(dest.exists());
        assert!(f.input.exists());
        assert_eq!(scratch_dirs(f.dir.path()), 0);

        let rendered = f.fake.rendered();
        // vp9 x2, opus, downmix, pass1, pass2, downmix encode, webvtt, mux
        assert_eq!(rendered.len(), 9);
        let mux = rendered.last().unwrap();
        assert!(mux.contains("-map 3:0"));
        assert!(mux.contains("title=Show - S01E02 - Pilot"));
        assert!(mux.contains("summary=Things happen."));
    }

    #[tokio::test]
    async fn streaming_profile_muxes_video_and_downmix() {
        let f = fixture(2, vec![sub(0, "subrip", "eng")]);
        let opts = FileOptions::new(Profile::Chromecast);
        let plan = f.pipeline.plan(&f.input, &opts).await.unwrap();
        assert_eq!(plan.wrapper, WrapperVariant::Streaming);
        assert!(plan.audio.is_none());
        assert!(plan.subtitle.is_none());
        assert!(plan.video.filter().iter().any(|a| a.contains("scale=1920:-2")));

        let dest = f.dir.path().join("show.s01e02.chromecast.mp4");
        f.pipeline
            .encode(&plan, &titles(), &opts.settings, &dest)
            .await
            .unwrap();
        let mux = f.fake.rendered().pop().unwrap();
        assert!(mux.contains("+faststart"));
        assert!(mux.contains("Streaming Version"));
        assert!(!mux.contains("-map 2:0"));
    }

    #[tokio::test]
    async fn mono_streaming_source_reaches_aac_as_stereo() {
        let f = fixture(1, Vec::new());
        let opts = FileOptions::new(Profile::Chromecast);
        let plan = f.pipeline.plan(&f.input, &opts).await.unwrap();
        assert_eq!(plan.wrapper, WrapperVariant::Streaming);
        let downmix = plan.downmix.as_ref().unwrap();
        assert_eq!(downmix.filter(), ["-af", "channelmap=channel_layout=stereo"]);

        let dest = f.dir.path().join("show.s01e02.chromecast.mp4");
        f.pipeline
            .encode(&plan, &titles(), &opts.settings, &dest)
            .await
            .unwrap();
        let rendered = f.fake.rendered();
        // h264, pass1, pass2, aac, mux
        assert_eq!(rendered.len(), 5);
        assert!(rendered[2].contains("measured_I="));
        assert!(rendered[2].contains("-ac 2"));
        assert!(rendered[3].contains("a0.normalized.wav"));
        assert!(rendered[3].contains("libfdk_aac"));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn image_burn_in_fails_before_any_encode() {
        let f = fixture(2, vec![sub(0, "hdmv_pgs_subtitle", "eng")]);
        let mut opts = FileOptions::new(Profile::Webm);
        opts.burn_in = true;
        let err = f.pipeline.plan(&f.input, &opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
        assert!(f.fake.commands().is_empty());
    }

    #[tokio::test]
    async fn image_soft_subtitle_is_skipped() {
        let f = fixture(2, vec![sub(0, "hdmv_pgs_subtitle", "eng")]);
        let plan = f
            .pipeline
            .plan(&f.input, &FileOptions::new(Profile::Webm))
            .await
            .unwrap();
        assert_eq!(plan.wrapper, WrapperVariant::Stereo);
        assert!(plan.downmix.is_none());
    }

    #[tokio::test]
    async fn unknown_channel_layout_is_unsupported() {
        let f = fixture(3, Vec::new());
        let err = f
            .pipeline
            .plan(&f.input, &FileOptions::new(Profile::Webm))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
    }

    #[tokio::test]
    async fn failed_encode_drops_workspace() {
        let f = fixture(2, Vec::new());
        f.fake.fail_when("libopus", "Unknown encoder 'libopus'");
        let opts = FileOptions::new(Profile::Webm);
        let plan = f.pipeline.plan(&f.input, &opts).await.unwrap();
        let dest = f.dir.path().join("show.s01e02.webm");
        let err = f
            .pipeline
            .encode(&plan, &titles(), &opts.settings, &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
        assert!(!dest.exists());
        assert_eq!(scratch_dirs(f.dir.path()), 0);
    }

    #[tokio::test]
    async fn failed_mux_keeps_workspace() {
        let f = fixture(2, Vec::new());
        f.fake.fail_when("summary=", "Invalid argument");
        let opts = FileOptions::new(Profile::Webm);
        let plan = f.pipeline.plan(&f.input, &opts).await.unwrap();
        let dest = f.dir.path().join("show.s01e02.webm");
        let err = f
            .pipeline
            .encode(&plan, &titles(), &opts.settings, &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MuxFailed);
        assert!(err.to_string().contains("intermediates kept in"));
        assert_eq!(scratch_dirs(f.dir.path()), 1);
    }

    #[tokio::test]
    async fn dry_run_description_lists_every_stream() {
        let f = fixture(8, vec![sub(2, "ass", "")]);
        let plan = f
            .pipeline
            .plan(&f.input, &FileOptions::new(Profile::Webm))
            .await
            .unwrap();
        let text = plan.describe().join("\n");
        assert!(text.contains("multichannel+subtitle"));
        assert!(text.contains("[vp9]"));
        assert!(text.contains("[opus]"));
        assert!(text.contains("[opus-downmix]"));
        assert!(text.contains("[webvtt]"));
        assert!(f.fake.commands().is_empty());
    }
}
