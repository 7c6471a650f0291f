//! Encode jobs and the dependency graph that orders and cleans them up.
//!
//! Jobs live in an arena keyed by [`JobId`]. A job may only name
//! predecessors that were added before it, so the graph is acyclic by
//! construction. Intermediate inputs are released (deleted) once every job
//! that consumes them has completed, and never more than once.
//!
//! Consumers that cannot be added yet (their spec depends on an earlier
//! job's diagnostics) are reserved with [`JobGraph::hold`]; a held artifact
//! is not released until the matching [`JobGraph::unhold`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use wm_av::Artifact;

use crate::spec::StreamSpec;

/// Index of a job in its [`JobGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a job writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    Artifact(Artifact),
    /// Encoded output is discarded (`-f null -`).
    Null,
}

impl JobOutput {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Artifact(a) => Some(a),
            Self::Null => None,
        }
    }
}

/// One external encoder invocation (two for two-pass variants).
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub label: String,
    pub input: Artifact,
    pub spec: StreamSpec,
    pub output: JobOutput,
    pub predecessors: Vec<JobId>,
    /// Keep the process diagnostics for the caller to parse.
    pub capture: bool,
    /// Shared pass-log prefix for two-pass encodes.
    pub passlog: Option<PathBuf>,
}

impl EncodeJob {
    pub fn new(label: impl Into<String>, input: Artifact, spec: StreamSpec, output: JobOutput) -> Self {
        Self {
            label: label.into(),
            input,
            spec,
            output,
            predecessors: Vec::new(),
            capture: false,
            passlog: None,
        }
    }

    pub fn after(mut self, predecessors: impl IntoIterator<Item = JobId>) -> Self {
        self.predecessors.extend(predecessors);
        self
    }

    pub fn capture_diagnostics(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn with_passlog(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.passlog = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Pending,
    Done,
}

#[derive(Debug)]
struct Record {
    job: EncodeJob,
    state: JobState,
}

/// Arena of encode jobs for one input file.
#[derive(Debug, Default)]
pub struct JobGraph {
    records: Vec<Record>,
    released: HashSet<PathBuf>,
    /// Consumers promised but not yet added, per input path.
    holds: HashMap<PathBuf, usize>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job and return its id.
    ///
    /// # Errors
    ///
    /// [`wm_core::Error::Internal`] when a predecessor is unknown, the job
    /// reads its own output, or another live job already writes the same
    /// artifact.
    pub fn add(&mut self, job: EncodeJob) -> wm_core::Result<JobId> {
        let id = JobId(self.records.len());
        if let Some(bad) = job.predecessors.iter().find(|p| p.0 >= id.0) {
            return Err(wm_core::Error::Internal(format!(
                "job '{}' depends on unknown job {bad}",
                job.label
            )));
        }
        if let Some(out) = job.output.artifact() {
            if out.path() == job.input.path() {
                return Err(wm_core::Error::Internal(format!(
                    "job '{}' writes its own input {}",
                    job.label,
                    out.path().display()
                )));
            }
            if let Some(other) = self.producer_of(out.path()) {
                return Err(wm_core::Error::Internal(format!(
                    "job '{}' and job '{}' both write {}",
                    job.label,
                    self.records[other.0].job.label,
                    out.path().display()
                )));
            }
        }
        tracing::trace!("add job {id} '{}' ({})", job.label, job.spec.variant());
        self.records.push(Record {
            job,
            state: JobState::Pending,
        });
        Ok(id)
    }

    pub fn job(&self, id: JobId) -> &EncodeJob {
        &self.records[id.0].job
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = JobId> {
        (0..self.records.len()).map(JobId)
    }

    pub fn is_done(&self, id: JobId) -> bool {
        self.records[id.0].state == JobState::Done
    }

    /// Current output artifact of a job, following any relocation.
    pub fn output(&self, id: JobId) -> Option<&Artifact> {
        self.records[id.0].job.output.artifact()
    }

    /// The job currently writing `path`, if any.
    fn producer_of(&self, path: &Path) -> Option<JobId> {
        self.records
            .iter()
            .position(|r| r.job.output.artifact().is_some_and(|a| a.path() == path))
            .map(JobId)
    }

    /// Check that `id` has not run yet and every predecessor has produced
    /// its output.
    pub fn check_ready(&self, id: JobId) -> wm_core::Result<()> {
        let record = &self.records[id.0];
        if record.state == JobState::Done {
            return Err(wm_core::Error::Internal(format!(
                "job {id} '{}' already ran",
                record.job.label
            )));
        }
        for &pred in &record.job.predecessors {
            if !self.is_done(pred) {
                return Err(wm_core::Error::Internal(format!(
                    "job {id} '{}' started before job {pred} completed",
                    record.job.label
                )));
            }
            if let Some(out) = self.output(pred) {
                if !out.exists() {
                    return Err(wm_core::Error::Internal(format!(
                        "job {id} '{}' is missing {}",
                        record.job.label,
                        out.path().display()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn complete(&mut self, id: JobId) {
        self.records[id.0].state = JobState::Done;
    }

    /// Record that a completed job's output was moved.
    pub fn relocate_output(&mut self, id: JobId, moved: Artifact) {
        self.records[id.0].job.output = JobOutput::Artifact(moved);
    }

    /// Intermediate inputs of `id` that no pending or held job still needs.
    pub fn releasable(&self, id: JobId) -> Vec<Artifact> {
        let input = &self.records[id.0].job.input;
        if self.is_unused(input) {
            vec![input.clone()]
        } else {
            Vec::new()
        }
    }

    fn is_unused(&self, input: &Artifact) -> bool {
        if !input.is_intermediate() || self.released.contains(input.path()) {
            return false;
        }
        if self.holds.get(input.path()).is_some_and(|n| *n > 0) {
            return false;
        }
        self.records
            .iter()
            .filter(|r| r.job.input.path() == input.path())
            .all(|r| r.state == JobState::Done)
    }

    /// Reserve `artifact` for a consumer that will be added later.
    pub fn hold(&mut self, artifact: &Artifact) {
        *self.holds.entry(artifact.path().to_path_buf()).or_default() += 1;
    }

    /// Drop one reservation on `artifact`. Returns it when nothing else
    /// needs it any more and it is ready to be released.
    pub fn unhold(&mut self, artifact: &Artifact) -> Option<Artifact> {
        if let Some(n) = self.holds.get_mut(artifact.path()) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.holds.remove(artifact.path());
            }
        }
        self.is_unused(artifact).then(|| artifact.clone())
    }

    pub fn mark_released(&mut self, artifact: &Artifact) {
        self.released.insert(artifact.path().to_path_buf());
    }

    pub fn is_released(&self, path: &Path) -> bool {
        self.released.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ProbedProps, SpecSettings, Variant};

    fn spec() -> StreamSpec {
        let props = ProbedProps {
            channels: Some(2),
            ..Default::default()
        };
        StreamSpec::build(Variant::NormalizePass1, "in.wav", 0, &props, &SpecSettings::default())
            .unwrap()
    }

    fn job(label: &str, input: Artifact, out: &str) -> EncodeJob {
        EncodeJob::new(label, input, spec(), JobOutput::Artifact(Artifact::intermediate(out)))
    }

    #[test]
    fn unknown_predecessor_rejected() {
        let mut g = JobGraph::new();
        let j = job("a", Artifact::owned_by_caller("src.mkv"), "a.wav").after([JobId(3)]);
        assert!(g.add(j).is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn one_writer_per_output() {
        let mut g = JobGraph::new();
        g.add(job("a", Artifact::owned_by_caller("src.mkv"), "x.wav")).unwrap();
        let err = g.add(job("b", Artifact::owned_by_caller("src.mkv"), "x.wav"));
        assert!(err.is_err());
    }

    #[test]
    fn relocated_output_frees_its_path() {
        let mut g = JobGraph::new();
        let a = g.add(job("a", Artifact::owned_by_caller("src.mkv"), "x.wav")).unwrap();
        g.complete(a);
        g.relocate_output(a, Artifact::intermediate("x.retry1.wav"));
        assert_eq!(g.output(a).unwrap().path(), Path::new("x.retry1.wav"));
        g.add(job("b", Artifact::intermediate("x.retry1.wav"), "x.wav")).unwrap();
    }

    #[test]
    fn predecessors_must_finish_first() {
        let mut g = JobGraph::new();
        let a = g.add(job("a", Artifact::owned_by_caller("src.mkv"), "a.wav")).unwrap();
        let b = g
            .add(job("b", Artifact::intermediate("a.wav"), "b.wav").after([a]))
            .unwrap();
        assert!(g.check_ready(b).is_err());
        g.complete(a);
        // a.wav was never written.
        assert!(g.check_ready(b).is_err());
        assert!(g.check_ready(a).is_err());
    }

    #[test]
    fn release_waits_for_every_consumer() {
        let mut g = JobGraph::new();
        let shared = Artifact::intermediate("down.wav");
        let p1 = g.add(job("p1", shared.clone(), "p1.out")).unwrap();
        let p2 = g.add(job("p2", shared.clone(), "p2.out")).unwrap();

        g.complete(p1);
        assert!(g.releasable(p1).is_empty());
        g.complete(p2);
        assert_eq!(g.releasable(p2), vec![shared.clone()]);
        g.mark_released(&shared);
        assert!(g.releasable(p2).is_empty());
        assert!(g.is_released(shared.path()));
    }

    #[test]
    fn held_input_outlives_its_first_consumer() {
        let mut g = JobGraph::new();
        let shared = Artifact::intermediate("down.wav");
        g.hold(&shared);
        let p1 = g.add(job("p1", shared.clone(), "p1.out")).unwrap();
        g.complete(p1);
        assert!(g.releasable(p1).is_empty());

        let p2 = g.add(job("p2", shared.clone(), "p2.out")).unwrap();
        g.complete(p2);
        assert!(g.releasable(p2).is_empty());
        assert_eq!(g.unhold(&shared), Some(shared.clone()));
        g.mark_released(&shared);
        assert_eq!(g.unhold(&shared), None);
    }

    #[test]
    fn unhold_waits_for_pending_consumers() {
        let mut g = JobGraph::new();
        let shared = Artifact::intermediate("down.wav");
        g.hold(&shared);
        g.add(job("p1", shared.clone(), "p1.out")).unwrap();
        assert_eq!(g.unhold(&shared), None);
    }

    #[test]
    fn caller_owned_inputs_are_never_released() {
        let mut g = JobGraph::new();
        let a = g.add(job("a", Artifact::owned_by_caller("src.mkv"), "a.wav")).unwrap();
        g.complete(a);
        assert!(g.releasable(a).is_empty());
    }
}
