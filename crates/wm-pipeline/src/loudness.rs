//! Loudness Normalization Engine.
//!
//! Two-pass EBU R128 normalization with ffmpeg's `loudnorm` filter:
//!
//! 1. Sources with more than two channels are folded down to stereo first.
//! 2. Pass 1 analyses the input and reports its loudness as JSON.
//! 3. Pass 2 applies the correction using those measurements, writing
//!    lossless PCM, and reports the loudness range it achieved.
//! 4. If the achieved range is above the convergence bound, the pass-2
//!    output is moved aside and becomes the input of the next iteration,
//!    up to a fixed cap.
//!
//! Superseded inputs are deleted by the job runner as soon as both passes
//! that read them have completed.

use serde_json::{Map, Value};
use wm_av::{Artifact, Workspace};

use crate::job::{EncodeJob, JobGraph, JobId, JobOutput};
use crate::runner::JobRunner;
use crate::spec::{ProbedProps, SpecSettings, StreamSpec, Variant};

/// First-pass loudness measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Integrated loudness (LUFS).
    pub input_i: f64,
    /// True peak (dBTP).
    pub input_tp: f64,
    /// Loudness range (LU).
    pub input_lra: f64,
    /// Gating threshold (LUFS).
    pub input_thresh: f64,
    pub target_offset: f64,
}

impl Measurement {
    /// Parse the JSON block `loudnorm` prints at the end of a first pass.
    ///
    /// # Errors
    ///
    /// [`wm_core::Error::MeasurementParse`] naming the first field that is
    /// absent or not a finite number.
    pub fn parse(diagnostics: &str) -> wm_core::Result<Self> {
        let block = json_block(diagnostics)?;
        Ok(Self {
            input_i: field(&block, "input_i")?,
            input_tp: field(&block, "input_tp")?,
            input_lra: field(&block, "input_lra")?,
            input_thresh: field(&block, "input_thresh")?,
            target_offset: field(&block, "target_offset")?,
        })
    }
}

/// Achieved loudness range from a second pass's diagnostics.
///
/// This is `output_lra` of the pass that wrote the normalized file, not a
/// value re-read from pass 1.
pub fn parse_output_lra(diagnostics: &str) -> wm_core::Result<f64> {
    field(&json_block(diagnostics)?, "output_lra")
}

fn json_block(diagnostics: &str) -> wm_core::Result<Map<String, Value>> {
    let start = diagnostics.rfind('{');
    let end = diagnostics.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(wm_core::Error::measurement(
            "json",
            "no loudnorm JSON block in diagnostics",
        ));
    };
    if end < start {
        return Err(wm_core::Error::measurement("json", "unterminated loudnorm JSON block"));
    }
    serde_json::from_str(&diagnostics[start..=end])
        .map_err(|e| wm_core::Error::measurement("json", e.to_string()))
}

fn field(block: &Map<String, Value>, name: &str) -> wm_core::Result<f64> {
    let value = block
        .get(name)
        .ok_or_else(|| wm_core::Error::measurement(name, "field missing"))?;
    // loudnorm prints numbers as strings.
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(wm_core::Error::measurement(
            name,
            format!("not a finite number: {value}"),
        )),
    }
}

/// Terminal state of the normalization loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    /// The iteration cap was reached with the range still above the bound.
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retry,
    Done(Outcome),
}

/// Bounded retry policy on the achieved loudness range.
#[derive(Debug, Clone)]
pub struct Convergence {
    bound: f64,
    cap: u32,
    iterations: u32,
}

impl Convergence {
    pub fn new(bound: f64, cap: u32) -> Self {
        Self {
            bound,
            cap: cap.max(1),
            iterations: 0,
        }
    }

    /// Record one completed iteration.
    pub fn observe(&mut self, achieved_lra: f64) -> Step {
        self.iterations += 1;
        if achieved_lra <= self.bound {
            Step::Done(Outcome::Converged)
        } else if self.iterations >= self.cap {
            Step::Done(Outcome::GaveUp)
        } else {
            Step::Retry
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Result of [`LoudnessEngine::normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Lossless stereo PCM, ready for the final lossy encode.
    pub artifact: Artifact,
    /// Job that produced `artifact`.
    pub producer: JobId,
    pub outcome: Outcome,
    pub iterations: u32,
    pub measurement: Measurement,
    pub achieved_lra: f64,
}

/// Drives the measure/apply loop through a [`JobRunner`].
pub struct LoudnessEngine<'a> {
    runner: &'a JobRunner,
    settings: &'a SpecSettings,
}

impl<'a> LoudnessEngine<'a> {
    pub fn new(runner: &'a JobRunner, settings: &'a SpecSettings) -> Self {
        Self { runner, settings }
    }

    /// Normalize audio stream `stream_index` of `source`.
    ///
    /// `label` prefixes every intermediate file name.
    pub async fn normalize(
        &self,
        graph: &mut JobGraph,
        workspace: &Workspace,
        source: Artifact,
        stream_index: u32,
        props: &ProbedProps,
        label: &str,
    ) -> wm_core::Result<Normalized> {
        let mut input = source;
        let mut index = stream_index;
        let mut after: Vec<JobId> = Vec::new();

        if props.channels.unwrap_or(0) > 2 {
            let spec = StreamSpec::build(
                Variant::StereoDownmix,
                input.path(),
                index,
                props,
                self.settings,
            )?;
            let out = workspace.intermediate(&format!("{label}.downmix.wav"));
            let id = graph.add(EncodeJob::new(
                format!("{label} downmix"),
                input,
                spec,
                JobOutput::Artifact(out.clone()),
            ))?;
            self.runner.run(graph, id, workspace).await?;
            input = out;
            index = 0;
            after = vec![id];
        }

        // Every later pass reads one stream of at most two channels; pass 2
        // upmixes a mono source so the result is always stereo.
        let mut pass_props = ProbedProps {
            channels: Some(if after.is_empty() {
                props.channels.unwrap_or(2).min(2)
            } else {
                2
            }),
            language: props.language.clone(),
            ..Default::default()
        };
        let l = &self.settings.loudness;
        let mut convergence = Convergence::new(l.convergence_bound, l.max_iterations);

        loop {
            let n = convergence.iterations() + 1;
            // Pass 2 reads the same input but can only be added once pass 1
            // has been measured.
            graph.hold(&input);

            let spec = StreamSpec::build(
                Variant::NormalizePass1,
                input.path(),
                index,
                &pass_props,
                self.settings,
            )?;
            let pass1 = graph.add(
                EncodeJob::new(format!("{label} measure {n}"), input.clone(), spec, JobOutput::Null)
                    .after(after.iter().copied())
                    .capture_diagnostics(),
            )?;
            let report = self.runner.run(graph, pass1, workspace).await?;
            let measurement = Measurement::parse(report.diagnostics.as_deref().unwrap_or_default())?;
            tracing::debug!("{label} iteration {n}: {measurement:?}");

            let spec = StreamSpec::build(
                Variant::NormalizePass2(measurement),
                input.path(),
                index,
                &pass_props,
                self.settings,
            )?;
            let out = workspace.intermediate(&format!("{label}.normalized.wav"));
            let pass2 = graph.add(
                EncodeJob::new(
                    format!("{label} normalize {n}"),
                    input.clone(),
                    spec,
                    JobOutput::Artifact(out.clone()),
                )
                .after(after.iter().copied().chain([pass1]))
                .capture_diagnostics(),
            )?;
            let report = self.runner.run(graph, pass2, workspace).await?;
            self.runner.unhold(graph, &input, workspace)?;
            let achieved_lra = parse_output_lra(report.diagnostics.as_deref().unwrap_or_default())?;

            match convergence.observe(achieved_lra) {
                Step::Done(outcome) => {
                    if outcome == Outcome::GaveUp {
                        tracing::warn!(
                            "{label}: loudness range {achieved_lra} still above {} after {n} iterations; keeping last pass",
                            l.convergence_bound
                        );
                    } else {
                        tracing::info!("{label}: loudness range {achieved_lra} after {n} iteration(s)");
                    }
                    return Ok(Normalized {
                        artifact: out,
                        producer: pass2,
                        outcome,
                        iterations: n,
                        measurement,
                        achieved_lra,
                    });
                }
                Step::Retry => {
                    tracing::info!(
                        "{label}: loudness range {achieved_lra} above {}, retrying",
                        l.convergence_bound
                    );
                    let moved = workspace.rename(&out, &format!("{label}.retry{n}.wav"))?;
                    graph.relocate_output(pass2, moved.clone());
                    input = moved;
                    index = 0;
                    pass_props.channels = Some(2);
                    after = vec![pass2];
                }
            }
        }
    }
}
