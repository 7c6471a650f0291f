//! webmify - transcode video files into delivery-ready containers.
//!
//! This library crate exposes the batch processor and metadata lookup for
//! the binary and for integration testing. The encode pipeline itself lives
//! in `wm-pipeline`.

pub mod batch;
pub mod metadata;
