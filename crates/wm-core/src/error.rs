//! Unified error type for webmify.
//!
//! Every failure in the encode pipeline funnels into [`Error`]. All variants
//! are fatal for the input file currently being processed; the batch
//! processor catches them per file and moves on to the next input.

use std::fmt;
use std::path::PathBuf;

/// Unified error type covering all failure modes in webmify.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The media prober could not answer a query about an artifact.
    #[error("Probe failed for {}: {message}", path.display())]
    ProbeFailed {
        /// Artifact that was being probed.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// A stream variant cannot be built from the probed properties
    /// (e.g. a channel count outside the known buckets).
    #[error("Unsupported variant [{variant}]: {reason}")]
    UnsupportedVariant {
        /// The variant tag that was requested.
        variant: String,
        /// Why it cannot be built.
        reason: String,
    },

    /// Subtitle burn-in was requested for a codec with no filter syntax.
    #[error("Unsupported subtitle codec for burn-in: {codec}")]
    UnsupportedSubtitle {
        /// Probed subtitle codec name.
        codec: String,
    },

    /// An encoder process exited with a non-zero status.
    #[error("Encode failed ({status}): {command}{}", render_diagnostics(.diagnostics))]
    EncodeFailed {
        /// The rendered command line that failed.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured diagnostic output of the process.
        diagnostics: String,
    },

    /// An expected field was missing from loudness-analysis diagnostics.
    #[error("Measurement parse error [{field}]: {message}")]
    MeasurementParse {
        /// The field that could not be extracted.
        field: String,
        /// Human-readable error description.
        message: String,
    },

    /// The final mux was rejected during validation or its process failed.
    #[error("Mux failed: {reason}{}{}", render_command(.command), render_diagnostics(.diagnostics))]
    MuxFailed {
        /// Why the mux failed.
        reason: String,
        /// The rendered mux command, if the process was started.
        command: Option<String>,
        /// Captured diagnostic output, empty when the process never ran.
        diagnostics: String,
    },

    /// Renaming or deleting an artifact failed.
    #[error("Artifact cleanup failed for {}: {source}", path.display())]
    ArtifactCleanup {
        /// The artifact being renamed or deleted.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool could not be found, spawned, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration or user input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote metadata lookup failed or returned nothing usable.
    #[error("Metadata lookup failed: {0}")]
    Metadata(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`], used for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProbeFailed,
    UnsupportedVariant,
    EncodeFailed,
    MeasurementParse,
    MuxFailed,
    ArtifactCleanup,
    Tool,
    Io,
    Validation,
    Metadata,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ProbeFailed => "probe",
            Self::UnsupportedVariant => "unsupported-variant",
            Self::EncodeFailed => "encode",
            Self::MeasurementParse => "measurement",
            Self::MuxFailed => "mux",
            Self::ArtifactCleanup => "cleanup",
            Self::Tool => "tool",
            Self::Io => "io",
            Self::Validation => "validation",
            Self::Metadata => "metadata",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

fn render_command(command: &Option<String>) -> String {
    match command {
        Some(cmd) => format!("\ncommand: {cmd}"),
        None => String::new(),
    }
}

fn render_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n--- diagnostics ---\n{trimmed}")
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            // Subtitle codec rejection is a variant-construction failure.
            Error::UnsupportedVariant { .. } | Error::UnsupportedSubtitle { .. } => {
                ErrorKind::UnsupportedVariant
            }
            Error::EncodeFailed { .. } => ErrorKind::EncodeFailed,
            Error::MeasurementParse { .. } => ErrorKind::MeasurementParse,
            Error::MuxFailed { .. } => ErrorKind::MuxFailed,
            Error::ArtifactCleanup { .. } => ErrorKind::ArtifactCleanup,
            Error::Tool { .. } => ErrorKind::Tool,
            Error::Io { .. } => ErrorKind::Io,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Metadata(_) => ErrorKind::Metadata,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Convenience constructor for [`Error::ProbeFailed`].
    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ProbeFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::UnsupportedVariant`].
    pub fn unsupported(variant: impl fmt::Display, reason: impl Into<String>) -> Self {
        Error::UnsupportedVariant {
            variant: variant.to_string(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EncodeFailed`].
    pub fn encode_failed(
        command: impl Into<String>,
        status: impl fmt::Display,
        diagnostics: impl Into<String>,
    ) -> Self {
        Error::EncodeFailed {
            command: command.into(),
            status: status.to_string(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Convenience constructor for [`Error::MeasurementParse`].
    pub fn measurement(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MeasurementParse {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A mux rejected before any process was started.
    pub fn mux_invalid(reason: impl Into<String>) -> Self {
        Error::MuxFailed {
            reason: reason.into(),
            command: None,
            diagnostics: String::new(),
        }
    }

    /// A mux whose process ran and failed.
    pub fn mux_failed(
        reason: impl Into<String>,
        command: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Error::MuxFailed {
            reason: reason.into(),
            command: Some(command.into()),
            diagnostics: diagnostics.into(),
        }
    }

    /// Convenience constructor for [`Error::ArtifactCleanup`].
    pub fn cleanup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ArtifactCleanup {
            path: path.into(),
            source,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_display() {
        let err = Error::probe("/media/show.mkv", "no audio stream a:3");
        assert_eq!(
            err.to_string(),
            "Probe failed for /media/show.mkv: no audio stream a:3"
        );
        assert_eq!(err.kind(), ErrorKind::ProbeFailed);
    }

    #[test]
    fn unsupported_subtitle_is_variant_class() {
        let err = Error::UnsupportedSubtitle {
            codec: "hdmv_pgs_subtitle".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
        assert!(err.to_string().contains("hdmv_pgs_subtitle"));
    }

    #[test]
    fn encode_failed_carries_command_and_diagnostics() {
        let err = Error::encode_failed(
            "ffmpeg -y -i in.mkv out.webm",
            "exit status: 1",
            "Unknown encoder 'libvpx-vp9'\n",
        );
        let text = err.to_string();
        assert!(text.contains("ffmpeg -y -i in.mkv out.webm"));
        assert!(text.contains("Unknown encoder 'libvpx-vp9'"));
        assert!(text.contains("exit status: 1"));
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
    }

    #[test]
    fn encode_failed_without_diagnostics() {
        let err = Error::encode_failed("ffmpeg -i a b", "exit status: 1", "   ");
        assert!(!err.to_string().contains("diagnostics"));
    }

    #[test]
    fn mux_invalid_has_no_command() {
        let err = Error::mux_invalid("missing subtitle artifact");
        assert_eq!(err.to_string(), "Mux failed: missing subtitle artifact");
        assert_eq!(err.kind(), ErrorKind::MuxFailed);
    }

    #[test]
    fn mux_failed_renders_command() {
        let err = Error::mux_failed("exit status: 1", "ffmpeg -i v -i a out", "boom");
        let text = err.to_string();
        assert!(text.contains("command: ffmpeg -i v -i a out"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn cleanup_display() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::cleanup("/tmp/x.wav", io);
        assert!(err.to_string().contains("/tmp/x.wav"));
        assert_eq!(err.kind(), ErrorKind::ArtifactCleanup);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn measurement_display() {
        let err = Error::measurement("input_thresh", "field absent");
        assert_eq!(
            err.to_string(),
            "Measurement parse error [input_thresh]: field absent"
        );
    }
}
