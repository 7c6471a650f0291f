//! wm-core: shared errors, configuration, and media-domain types.
//!
//! This crate is the foundational dependency for all other wm-* crates,
//! providing the unified error taxonomy, application configuration, and the
//! small set of enums (stream roles, channel buckets, languages) that the
//! probe, spec and mux layers agree on.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
