//! # wm-pipeline
//!
//! The encode pipeline: everything between probing a source and writing the
//! final container.
//!
//! This crate provides:
//!
//! - **[`StreamSpec`]** -- immutable per-stream directive groups built from a
//!   [`Variant`] and probed properties.
//! - **[`JobGraph`]** / **[`JobRunner`]** -- an arena of encode jobs with
//!   predecessor lists, run through ffmpeg with consumer-based cleanup of
//!   intermediate files.
//! - **[`LoudnessEngine`]** -- two-pass `loudnorm` normalization with a
//!   bounded convergence retry loop.
//! - **[`Muxer`]** -- validated stream-copy mux into the wrapper layouts.
//! - **[`FilePipeline`]** -- plans and runs one input file end to end.

pub mod file;
pub mod job;
pub mod loudness;
pub mod mux;
pub mod runner;
pub mod spec;

#[cfg(test)]
mod testing;

// Re-export key types at the crate root.
pub use file::{FileOptions, FilePipeline, FilePlan, SubtitleMode, Titles};
pub use job::{EncodeJob, JobGraph, JobId, JobOutput};
pub use loudness::{LoudnessEngine, Measurement, Normalized, Outcome};
pub use mux::{MuxPlan, MuxTrack, Muxer, WrapperVariant};
pub use runner::{JobReport, JobRunner};
pub use spec::{BurnIn, ProbedProps, SpecSettings, StreamSpec, Variant};
