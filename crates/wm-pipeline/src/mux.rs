//! Mux/Wrapper: stream-copy the encoded pieces into the final container.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wm_av::{Artifact, ProcessRunner, ToolCommand, ToolConfig, Workspace};
use wm_core::{ChannelBucket, Profile, StreamRole};

/// The container layouts the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperVariant {
    /// Video and one stereo (or mono) audio track.
    Stereo,
    StereoSubtitle,
    /// Video, multichannel audio and a normalized stereo downmix.
    MultiChannel,
    MultiChannelSubtitle,
    /// H.264 video and a normalized AAC downmix in MP4.
    Streaming,
}

impl WrapperVariant {
    /// Pick the wrapper for a profile, the source's channel layout and
    /// whether a soft subtitle track is included.
    pub fn choose(profile: Profile, bucket: ChannelBucket, subtitle: bool) -> Self {
        match (profile, bucket.uses_filter_pad(), subtitle) {
            (Profile::Chromecast, _, _) => Self::Streaming,
            (Profile::Webm, false, false) => Self::Stereo,
            (Profile::Webm, false, true) => Self::StereoSubtitle,
            (Profile::Webm, true, false) => Self::MultiChannel,
            (Profile::Webm, true, true) => Self::MultiChannelSubtitle,
        }
    }

    /// Track kinds in mux order.
    pub fn expected_tracks(self) -> &'static [StreamRole] {
        use StreamRole::{Audio, Subtitle, Video};
        match self {
            Self::Stereo | Self::Streaming => &[Video, Audio],
            Self::StereoSubtitle => &[Video, Audio, Subtitle],
            Self::MultiChannel => &[Video, Audio, Audio],
            Self::MultiChannelSubtitle => &[Video, Audio, Audio, Subtitle],
        }
    }

    /// Whether the plan carries a normalized downmix track.
    pub fn has_downmix(self) -> bool {
        matches!(
            self,
            Self::MultiChannel | Self::MultiChannelSubtitle | Self::Streaming
        )
    }
}

impl fmt::Display for WrapperVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stereo => write!(f, "stereo"),
            Self::StereoSubtitle => write!(f, "stereo+subtitle"),
            Self::MultiChannel => write!(f, "multichannel"),
            Self::MultiChannelSubtitle => write!(f, "multichannel+subtitle"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// One component of the final container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxTrack {
    pub artifact: Artifact,
    pub kind: StreamRole,
}

impl MuxTrack {
    pub fn new(artifact: Artifact, kind: StreamRole) -> Self {
        Self { artifact, kind }
    }
}

/// Everything the mux needs.
#[derive(Debug, Clone)]
pub struct MuxPlan {
    pub variant: WrapperVariant,
    pub output: PathBuf,
    pub title: String,
    pub summary: String,
    pub tracks: Vec<MuxTrack>,
}

impl MuxPlan {
    /// Check the plan against its wrapper variant.
    ///
    /// # Errors
    ///
    /// [`wm_core::Error::MuxFailed`] when the track layout differs from the
    /// variant's, a component file is missing, or the output would overwrite
    /// a component.
    pub fn validate(&self) -> wm_core::Result<()> {
        let expected = self.variant.expected_tracks();
        let actual: Vec<StreamRole> = self.tracks.iter().map(|t| t.kind).collect();
        if actual != expected {
            return Err(wm_core::Error::mux_invalid(format!(
                "{} wrapper expects tracks {} but the plan has {}",
                self.variant,
                roles(expected),
                roles(&actual)
            )));
        }
        for track in &self.tracks {
            if !track.artifact.exists() {
                return Err(wm_core::Error::mux_invalid(format!(
                    "{} track {} does not exist",
                    track.kind,
                    track.artifact.path().display()
                )));
            }
            if track.artifact.path() == self.output {
                return Err(wm_core::Error::mux_invalid(format!(
                    "output {} is also an input",
                    self.output.display()
                )));
            }
        }
        Ok(())
    }

    /// Container title as written to metadata.
    pub fn container_title(&self) -> String {
        match self.variant {
            WrapperVariant::Streaming => format!("{} - Streaming Version", self.title),
            _ => self.title.clone(),
        }
    }
}

fn roles(kinds: &[StreamRole]) -> String {
    let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// Runs the mux through ffmpeg.
#[derive(Clone)]
pub struct Muxer {
    ffmpeg: ToolConfig,
    process: Arc<dyn ProcessRunner>,
}

impl fmt::Debug for Muxer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Muxer")
            .field("ffmpeg", &self.ffmpeg.path)
            .finish_non_exhaustive()
    }
}

impl Muxer {
    pub fn new(ffmpeg: ToolConfig, process: Arc<dyn ProcessRunner>) -> Self {
        Self { ffmpeg, process }
    }

    /// The mux command line for a plan.
    pub fn command(&self, plan: &MuxPlan) -> ToolCommand {
        let mut cmd = self.ffmpeg.command();
        cmd.arg("-y");
        for track in &plan.tracks {
            cmd.arg("-i").path_arg(track.artifact.path());
        }
        for n in 0..plan.tracks.len() {
            cmd.args(["-map".to_string(), format!("{n}:0")]);
        }
        cmd.args(["-c:v", "copy", "-c:a", "copy"]);
        if plan.tracks.iter().any(|t| t.kind == StreamRole::Subtitle) {
            cmd.args(["-c:s", "copy"]);
        }
        cmd.arg("-metadata")
            .arg(format!("title={}", plan.container_title()));
        cmd.arg("-metadata").arg(format!("summary={}", plan.summary));
        if plan.variant == WrapperVariant::Streaming {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.path_arg(&plan.output);
        cmd
    }

    /// Validate and run the mux, then delete every intermediate component.
    ///
    /// Components are left in place when the mux fails.
    pub async fn mux(&self, plan: &MuxPlan, workspace: &Workspace) -> wm_core::Result<PathBuf> {
        plan.validate()?;
        let cmd = self.command(plan);
        tracing::info!("[mux {}] {}", plan.variant, cmd.render());

        let output = self.process.run(&cmd).await.map_err(|e| {
            wm_core::Error::mux_failed(format!("could not run mux: {e}"), cmd.render(), "")
        })?;
        if !output.success() {
            let text = output.diagnostics();
            tracing::error!("[mux {}] failed ({}):\n{}", plan.variant, output.status(), text.trim_end());
            return Err(wm_core::Error::mux_failed(output.status(), cmd.render(), text));
        }
        if !Path::new(&plan.output).exists() {
            return Err(wm_core::Error::mux_failed(
                format!("no output written to {}", plan.output.display()),
                cmd.render(),
                output.diagnostics(),
            ));
        }

        for track in plan.tracks.iter().filter(|t| t.artifact.is_intermediate()) {
            workspace.remove(&track.artifact)?;
        }
        Ok(plan.output.clone())
    }
}
