//! Encode Job Runner: turns a job into encoder command lines and runs them.

use std::path::Path;
use std::sync::Arc;

use wm_av::{Artifact, ProcessRunner, ToolCommand, ToolConfig, Workspace};

use crate::job::{EncodeJob, JobGraph, JobId, JobOutput};

/// What a completed job left behind.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub output: Option<Artifact>,
    /// Present when the job asked for its diagnostics.
    pub diagnostics: Option<String>,
}

/// Runs [`EncodeJob`]s through ffmpeg.
#[derive(Clone)]
pub struct JobRunner {
    ffmpeg: ToolConfig,
    process: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("ffmpeg", &self.ffmpeg.path)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    pub fn new(ffmpeg: ToolConfig, process: Arc<dyn ProcessRunner>) -> Self {
        Self { ffmpeg, process }
    }

    pub fn ffmpeg(&self) -> &ToolConfig {
        &self.ffmpeg
    }

    pub fn process(&self) -> &Arc<dyn ProcessRunner> {
        &self.process
    }

    /// The command lines a job runs, in order: one, or two for two-pass
    /// variants.
    pub fn commands(&self, job: &EncodeJob) -> Vec<ToolCommand> {
        match (&job.passlog, job.spec.variant().is_two_pass()) {
            (Some(log), true) => vec![
                self.assemble(job, Some((1, log))),
                self.assemble(job, Some((2, log))),
            ],
            _ => vec![self.assemble(job, None)],
        }
    }

    fn assemble(&self, job: &EncodeJob, pass: Option<(u8, &Path)>) -> ToolCommand {
        let spec = &job.spec;
        let mut cmd = self.ffmpeg.command();
        cmd.arg("-y");
        cmd.arg("-i").path_arg(job.input.path());
        cmd.args(spec.filter());
        cmd.args(spec.selection());
        cmd.args(spec.encode());
        if let Some((n, log)) = pass {
            cmd.args(["-pass".to_string(), n.to_string()]);
            cmd.arg("-passlogfile").path_arg(log);
        }
        cmd.args(spec.metadata());

        let null_sink = matches!(pass, Some((1, _))) || job.output == JobOutput::Null;
        match (&job.output, null_sink) {
            (JobOutput::Artifact(out), false) => {
                cmd.path_arg(out.path());
            }
            _ => {
                cmd.args(["-f", "null", "-"]);
            }
        }
        cmd
    }

    /// Run job `id` to completion, then release any inputs no other job
    /// still needs.
    ///
    /// # Errors
    ///
    /// - [`wm_core::Error::EncodeFailed`] on a non-zero exit or a missing
    ///   output, carrying the command line and its diagnostics.
    /// - [`wm_core::Error::ArtifactCleanup`] when releasing an input fails.
    /// - [`wm_core::Error::Internal`] when a predecessor has not completed.
    pub async fn run(
        &self,
        graph: &mut JobGraph,
        id: JobId,
        workspace: &Workspace,
    ) -> wm_core::Result<JobReport> {
        graph.check_ready(id)?;
        let job = graph.job(id);
        let mut diagnostics = None;

        for cmd in self.commands(job) {
            tracing::info!("[{}] {}", job.label, cmd.render());
            let output = self.process.run(&cmd).await?;
            if !output.success() {
                let text = output.diagnostics();
                tracing::error!(
                    "[{}] {} failed ({}):\n{}",
                    job.label,
                    cmd.program_name(),
                    output.status(),
                    text.trim_end()
                );
                return Err(wm_core::Error::encode_failed(cmd.render(), output.status(), text));
            }
            if job.capture {
                diagnostics = Some(output.diagnostics());
            }
        }

        if let Some(out) = job.output.artifact() {
            if !out.exists() {
                let cmd = self.commands(job).pop().map(|c| c.render()).unwrap_or_default();
                return Err(wm_core::Error::encode_failed(
                    cmd,
                    "exit status: 0",
                    format!("no output written to {}", out.path().display()),
                ));
            }
        }
        let output = job.output.artifact().cloned();

        graph.complete(id);
        for artifact in graph.releasable(id) {
            workspace.remove(&artifact)?;
            graph.mark_released(&artifact);
        }

        Ok(JobReport {
            output,
            diagnostics,
        })
    }

    /// Drop a reservation taken with [`JobGraph::hold`], deleting the
    /// artifact if no job still needs it.
    pub fn unhold(
        &self,
        graph: &mut JobGraph,
        artifact: &Artifact,
        workspace: &Workspace,
    ) -> wm_core::Result<()> {
        if let Some(artifact) = graph.unhold(artifact) {
            workspace.remove(&artifact)?;
            graph.mark_released(&artifact);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ProbedProps, SpecSettings, StreamSpec, Variant};
    use crate::testing::ScriptedRunner;
    use std::time::Duration;

    fn ffmpeg() -> ToolConfig {
        ToolConfig {
            name: "ffmpeg".into(),
            path: "/usr/bin/ffmpeg".into(),
            timeout: Duration::from_secs(10),
        }
    }

    fn stereo() -> ProbedProps {
        ProbedProps {
            channels: Some(2),
            language: "eng".into(),
            height: Some(1080),
            ..Default::default()
        }
    }

    fn setup() -> (tempfile::TempDir, Workspace, Arc<ScriptedRunner>, JobRunner) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("show.s01e02.mkv");
        std::fs::write(&input, b"source").unwrap();
        let ws = Workspace::new(&input, dir.path()).unwrap();
        let fake = Arc::new(ScriptedRunner::default());
        let runner = JobRunner::new(ffmpeg(), fake.clone());
        (dir, ws, fake, runner)
    }

    #[test]
    fn command_order() {
        let (_dir, ws, _fake, runner) = setup();
        let spec =
            StreamSpec::build(Variant::Opus, ws.input(), 0, &stereo(), &SpecSettings::default())
                .unwrap();
        let out = ws.intermediate("a0.opus");
        let job = EncodeJob::new("audio", ws.source(), spec, JobOutput::Artifact(out.clone()));
        let cmds = runner.commands(&job);
        assert_eq!(cmds.len(), 1);
        let args = cmds[0].get_args();
        let input = ws.input().to_string_lossy().to_string();
        let output = out.path().to_string_lossy().to_string();
        assert_eq!(
            args,
            [
                "-y",
                "-i",
                input.as_str(),
                "-af",
                "channelmap=channel_layout=stereo",
                "-map",
                "0:a:0",
                "-c:a",
                "libopus",
                "-b:a",
                "128k",
                "-metadata:s:a",
                "title=English - Opus Stereo",
                "-metadata:s:a",
                "language=eng",
                output.as_str(),
            ]
        );
    }

    #[test]
    fn two_pass_shares_passlog_and_discards_first_pass() {
        let (_dir, ws, _fake, runner) = setup();
        let spec =
            StreamSpec::build(Variant::Vp9, ws.input(), 0, &stereo(), &SpecSettings::default())
                .unwrap();
        let out = ws.intermediate("v0.webm");
        let log = ws.temp_file("v0");
        let job = EncodeJob::new("video", ws.source(), spec, JobOutput::Artifact(out.clone()))
            .with_passlog(&log);
        let cmds = runner.commands(&job);
        assert_eq!(cmds.len(), 2);

        let first = cmds[0].get_args();
        let second = cmds[1].get_args();
        let log = log.to_string_lossy().to_string();
        let pass_at = |args: &[String]| args.iter().position(|a| a == "-pass").unwrap();
        assert_eq!(first[pass_at(first) + 1], "1");
        assert_eq!(second[pass_at(second) + 1], "2");
        assert_eq!(first[pass_at(first) + 3], log);
        assert_eq!(second[pass_at(second) + 3], log);
        assert_eq!(&first[first.len() - 3..], ["-f", "null", "-"]);
        assert_eq!(second.last().unwrap(), &out.path().to_string_lossy().to_string());
    }

    #[tokio::test]
    async fn failing_encode_reports_command_and_diagnostics() {
        let (_dir, ws, fake, runner) = setup();
        fake.fail_when("libopus", "Unknown encoder 'libopus'");
        let spec =
            StreamSpec::build(Variant::Opus, ws.input(), 0, &stereo(), &SpecSettings::default())
                .unwrap();
        let mut graph = JobGraph::new();
        let id = graph
            .add(EncodeJob::new(
                "audio",
                ws.source(),
                spec,
                JobOutput::Artifact(ws.intermediate("a0.opus")),
            ))
            .unwrap();
        let err = runner.run(&mut graph, id, &ws).await.unwrap_err();
        match err {
            wm_core::Error::EncodeFailed {
                command,
                diagnostics,
                ..
            } => {
                assert!(command.contains("libopus"));
                assert!(command.contains("show.s01e02.mkv"));
                assert!(diagnostics.contains("Unknown encoder"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!graph.is_done(id));
    }

    #[tokio::test]
    async fn consumed_intermediate_is_released() {
        let (_dir, ws, fake, runner) = setup();
        let mut graph = JobGraph::new();
        let props = ProbedProps {
            channels: Some(6),
            ..stereo()
        };
        let down = ws.intermediate("a0.downmix.wav");
        let spec = StreamSpec::build(
            Variant::StereoDownmix,
            ws.input(),
            0,
            &props,
            &SpecSettings::default(),
        )
        .unwrap();
        let d = graph
            .add(EncodeJob::new("downmix", ws.source(), spec, JobOutput::Artifact(down.clone())))
            .unwrap();
        runner.run(&mut graph, d, &ws).await.unwrap();
        assert!(down.exists());

        let spec =
            StreamSpec::build(Variant::Opus, down.path(), 0, &stereo(), &SpecSettings::default())
                .unwrap();
        let out = ws.intermediate("a0.opus");
        let e = graph
            .add(
                EncodeJob::new("encode", down.clone(), spec, JobOutput::Artifact(out.clone()))
                    .after([d]),
            )
            .unwrap();
        runner.run(&mut graph, e, &ws).await.unwrap();
        assert!(!down.exists());
        assert!(out.exists());
        assert!(graph.is_released(down.path()));
        assert_eq!(fake.commands().len(), 2);
        assert!(ws.input().exists());
    }
}
