//! # wm-av
//!
//! Process plumbing for the webmify pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`], [`ProcessRunner`]) -- async
//!   builder with timeout support, and the runner seam the pipeline hands its
//!   commands to.
//! - **Workspace management** ([`Workspace`], [`Artifact`]) -- per-file
//!   scratch directory with artifact ownership and safe finalization.
//! - **Probe adapter** ([`probe::MediaProbe`], [`FfprobeProber`]) -- narrow
//!   stream queries answered by ffprobe.

pub mod command;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ProcessRunner, SystemRunner, ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, MediaProbe, SubtitleStream};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{Artifact, Lifecycle, Workspace};
