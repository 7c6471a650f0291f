//! Shared fakes for integration tests.
//!
//! [`FakeFfmpeg`] stands in for every ffmpeg invocation: it records the
//! command, writes a placeholder at the output path and answers loudnorm
//! passes with canned diagnostics. [`FakeProbe`] answers stream queries for
//! a stereo 1080p source.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use webmify::metadata::{EpisodeInfo, MetadataLookup, MovieInfo, Show};
use wm_av::{MediaProbe, ProcessRunner, SubtitleStream, ToolCommand, ToolConfig, ToolOutput};
use wm_pipeline::FilePipeline;

const PASS1: &str = "[Parsed_loudnorm_0 @ 0x1]\n{\n\t\"input_i\" : \"-24.10\",\n\
\t\"input_tp\" : \"-3.20\",\n\t\"input_lra\" : \"9.40\",\n\t\"input_thresh\" : \"-35.00\",\n\
\t\"output_i\" : \"-16.20\",\n\t\"output_tp\" : \"-1.50\",\n\t\"output_lra\" : \"8.10\",\n\
\t\"output_thresh\" : \"-26.60\",\n\t\"normalization_type\" : \"dynamic\",\n\
\t\"target_offset\" : \"0.20\"\n}\n";

const PASS2: &str = "[Parsed_loudnorm_0 @ 0x1]\n{\n\t\"input_i\" : \"-24.10\",\n\
\t\"output_i\" : \"-16.01\",\n\t\"output_lra\" : \"8.00\",\n\t\"target_offset\" : \"0.01\"\n}\n";

#[derive(Default)]
pub struct FakeFfmpeg {
    seen: Mutex<Vec<ToolCommand>>,
    fail_on: Mutex<Option<String>>,
}

impl FakeFfmpeg {
    pub fn commands(&self) -> Vec<ToolCommand> {
        self.seen.lock().unwrap().clone()
    }

    /// Exit 1 for any command whose rendering contains `needle`.
    pub fn fail_when(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    /// The stream-copy mux commands, in order.
    pub fn mux_commands(&self) -> Vec<ToolCommand> {
        self.commands()
            .into_iter()
            .filter(|c| c.get_args().iter().any(|a| a == "-metadata"))
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeFfmpeg {
    async fn run(&self, cmd: &ToolCommand) -> wm_core::Result<ToolOutput> {
        self.seen.lock().unwrap().push(cmd.clone());
        let rendered = cmd.render();

        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if rendered.contains(needle) {
                return Ok(ToolOutput::failed(1, "Conversion failed!"));
            }
        }

        let stderr = if rendered.contains("measured_I=") {
            PASS2
        } else if rendered.contains("loudnorm=") {
            PASS1
        } else {
            ""
        };
        if let Some(out) = cmd.get_args().last() {
            if out != "-" {
                std::fs::write(out, b"media")?;
            }
        }
        Ok(ToolOutput::ok("", stderr))
    }
}

pub struct FakeProbe {
    pub channels: u32,
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
        Ok(1080)
    }
    async fn color_space(&self, _: &Path, _: u32) -> wm_core::Result<String> {
        Ok("bt709".into())
    }
    async fn crop_rect(&self, _: &Path) -> wm_core::Result<String> {
        Ok("1920:800:0:140".into())
    }
    async fn subtitle_streams(&self, _: &Path) -> wm_core::Result<Vec<SubtitleStream>> {
        Ok(vec![SubtitleStream {
            index: 0,
            codec: "subrip".into(),
            language: "eng".into(),
        }])
    }
    async fn subtitle_codec(&self, _: &Path, _: u32) -> wm_core::Result<String> {
        Ok("subrip".into())
    }
}

/// Canned metadata that counts show searches.
#[derive(Default)]
pub struct StubLookup {
    pub show_searches: AtomicUsize,
}

impl StubLookup {
    pub fn show_searches(&self) -> usize {
        self.show_searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataLookup for StubLookup {
    async fn movie(&self, title: &str) -> wm_core::Result<MovieInfo> {
        Ok(MovieInfo {
            title: format!("{title} (Remastered)"),
            release_date: "1995-12-15".into(),
            overview: "A heist.".into(),
        })
    }

    async fn show(&self, title: &str) -> wm_core::Result<Show> {
        self.show_searches.fetch_add(1, Ordering::SeqCst);
        Ok(Show {
            id: Some(7),
            name: format!("The {title}"),
        })
    }

    async fn episode(&self, _: &Show, season: u32, episode: u32) -> wm_core::Result<EpisodeInfo> {
        Ok(EpisodeInfo {
            season,
            episode,
            name: "Pilot".into(),
            air_date: "2019-04-08".into(),
            overview: "Things happen.".into(),
        })
    }
}

pub fn ffmpeg() -> ToolConfig {
    ToolConfig {
        name: "ffmpeg".into(),
        path: "ffmpeg".into(),
        timeout: Duration::from_secs(5),
    }
}

pub fn pipeline(channels: u32, runner: Arc<FakeFfmpeg>) -> FilePipeline {
    FilePipeline::new(Arc::new(FakeProbe { channels }), ffmpeg(), runner)
}

/// Write a placeholder source file.
pub fn source(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"source").unwrap();
    path
}
