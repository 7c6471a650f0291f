//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool, encode, loudness, subtitle and metadata sections. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::Profile;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub encode: EncodeConfig,
    pub loudness: LoudnessConfig,
    pub subtitles: SubtitleConfig,
    pub metadata: MetadataConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.encode.crf > 63 {
            warnings.push(format!(
                "encode.crf {} is outside the encoder range 0-63",
                self.encode.crf
            ));
        }
        if self.encode.threads == 0 {
            warnings.push("encode.threads is 0; the encoder will pick a default".into());
        }

        if self.loudness.max_iterations == 0 {
            warnings.push(
                "loudness.max_iterations is 0; normalization will run a single pass pair".into(),
            );
        }
        if self.loudness.convergence_bound <= 0.0 {
            warnings.push("loudness.convergence_bound must be positive".into());
        }
        if self.loudness.true_peak > 0.0 {
            warnings.push(format!(
                "loudness.true_peak {} is above 0 dBTP",
                self.loudness.true_peak
            ));
        }

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!("{name} {} does not exist", p.display()));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths and timeouts for external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Upper bound for a single encoder or mux invocation.
    pub encode_timeout_secs: u64,
    /// Upper bound for a single probe invocation.
    pub probe_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            encode_timeout_secs: 86_400,
            probe_timeout_secs: 300,
        }
    }
}

/// Video encode defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub crf: u32,
    pub threads: u32,
    /// Profile used for every input; `None` picks per media kind.
    pub default_profile: Option<Profile>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            crf: 20,
            threads: 16,
            default_profile: None,
        }
    }
}

/// Two-pass loudness normalization targets and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Integrated loudness target (LUFS).
    pub integrated: f64,
    /// Loudness range target (LU).
    pub range: f64,
    /// Maximum true peak (dBTP).
    pub true_peak: f64,
    /// Largest acceptable achieved loudness range after the second pass.
    pub convergence_bound: f64,
    /// Maximum number of measure/apply iterations.
    pub max_iterations: u32,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            range: 16.0,
            true_peak: -1.5,
            convergence_bound: 18.2,
            max_iterations: 4,
        }
    }
}

/// Styling applied when burning subrip subtitles into the picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub font_name: String,
    pub font_size: u32,
    /// ASS `&HAABBGGRR` colour.
    pub primary_colour: String,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            font_name: "Roboto".into(),
            font_size: 20,
            primary_colour: "&H30DDDDDD".into(),
        }
    }
}

/// Metadata lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub tmdb_api_key: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tmdb_url")]
    pub base_url: String,
}

fn default_language() -> String {
    "en-US".into()
}

fn default_tmdb_url() -> String {
    "https://api.themoviedb.org/3".into()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            language: default_language(),
            base_url: default_tmdb_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.encode.crf, 20);
        assert_eq!(cfg.encode.threads, 16);
        assert_eq!(cfg.loudness.convergence_bound, 18.2);
        assert_eq!(cfg.loudness.max_iterations, 4);
        assert_eq!(cfg.subtitles.font_name, "Roboto");
        assert_eq!(cfg.metadata.language, "en-US");
        assert_eq!(cfg.tools.encode_timeout_secs, 86_400);
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"encode": {"crf": 24}, "loudness": {"max_iterations": 2}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.encode.crf, 24);
        assert_eq!(cfg.encode.threads, 16);
        assert_eq!(cfg.loudness.max_iterations, 2);
        assert_eq!(cfg.loudness.integrated, -16.0);
    }

    #[test]
    fn parse_profile_override() {
        let cfg = Config::from_json(r#"{"encode": {"default_profile": "chromecast"}}"#).unwrap();
        assert_eq!(cfg.encode.default_profile, Some(Profile::Chromecast));
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.encode.crf, 20);
    }

    #[test]
    fn invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/webmify.json")));
        assert_eq!(cfg.encode.crf, 20);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webmify.json");
        std::fs::write(&path, r#"{"subtitles": {"font_size": 24}}"#).unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.subtitles.font_size, 24);
    }

    #[test]
    fn bad_values_warn() {
        let mut cfg = Config::default();
        cfg.encode.crf = 99;
        cfg.loudness.convergence_bound = 0.0;
        cfg.tools.ffmpeg_path = Some(PathBuf::from("/nonexistent/ffmpeg"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("encode.crf")));
        assert!(warnings.iter().any(|w| w.contains("convergence_bound")));
        assert!(warnings.iter().any(|w| w.contains("tools.ffmpeg_path")));
    }
}
