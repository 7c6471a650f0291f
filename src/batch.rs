//! Sequential batch processing of input files.
//!
//! Files run strictly one after another. A failure ends that file's pipeline
//! only; the batch records it and moves on. The only state carried between
//! files is the show resolved for the previous file, reused when the next
//! file parses to the same title.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use wm_core::{MediaKind, Profile};
use wm_pipeline::{FileOptions, FilePipeline, Titles};

use crate::metadata::{MetadataLookup, Show};

/// Options shared by every file of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    /// Output base name; only meaningful for a single input.
    pub filename: Option<String>,
    pub title: Option<String>,
    pub season: Option<String>,
    pub episode: Option<String>,
    /// Forced profile; otherwise derived from the media kind.
    pub profile: Option<Profile>,
    /// Template for per-file options; its profile is replaced per file.
    pub file: FileOptions,
    pub delete_original: bool,
    pub dry_run: bool,
}

/// What happened to each input.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub encoded: Vec<PathBuf>,
    pub planned: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, wm_core::Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Identity of one input as parsed from its name and the CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub title: String,
    pub kind: MediaKind,
    pub season: u32,
    pub episode: u32,
}

impl Identity {
    /// Resolve title, season and episode; CLI values win over the filename.
    pub fn resolve(input: &Path, opts: &BatchOptions) -> wm_core::Result<Self> {
        let parsed = wm_parser::parse(input);
        let title = opts.title.clone().unwrap_or(parsed.title).trim().to_string();
        let season = opts.season.clone().or(parsed.season);
        let episode = opts.episode.clone().or(parsed.episode);

        let number = |what: &str, value: &str| {
            value.trim().parse::<u32>().map_err(|_| {
                wm_core::Error::Validation(format!("{what} '{value}' is not a number"))
            })
        };
        match (season, episode) {
            (None, None) => Ok(Self {
                title,
                kind: MediaKind::Movie,
                season: 0,
                episode: 0,
            }),
            (Some(s), Some(e)) => Ok(Self {
                title,
                kind: MediaKind::Episode,
                season: number("season", &s)?,
                episode: number("episode", &e)?,
            }),
            (Some(_), None) => Err(wm_core::Error::Validation(format!(
                "{}: season found but no episode; pass --episode",
                input.display()
            ))),
            (None, Some(_)) => Err(wm_core::Error::Validation(format!(
                "{}: episode found but no season; pass --season",
                input.display()
            ))),
        }
    }
}

/// Runs a list of inputs through the file pipeline.
pub struct BatchProcessor {
    pipeline: FilePipeline,
    metadata: Arc<dyn MetadataLookup>,
}

impl BatchProcessor {
    pub fn new(pipeline: FilePipeline, metadata: Arc<dyn MetadataLookup>) -> Self {
        Self { pipeline, metadata }
    }

    pub async fn run(&self, inputs: &[PathBuf], opts: &BatchOptions) -> BatchReport {
        let mut report = BatchReport::default();
        let mut previous: Option<(PathBuf, Show)> = None;

        for (n, input) in inputs.iter().enumerate() {
            tracing::info!("[{}/{}] {}", n + 1, inputs.len(), input.display());
            match self.process(input, opts, &mut previous).await {
                Ok(Some(out)) => report.encoded.push(out),
                Ok(None) => report.planned.push(input.clone()),
                Err(e) => {
                    tracing::error!("{}: {e}", input.display());
                    report.failed.push((input.clone(), e));
                }
            }
        }

        tracing::info!(
            "batch finished: {} encoded, {} planned, {} failed",
            report.encoded.len(),
            report.planned.len(),
            report.failed.len()
        );
        report
    }

    /// Encode one file; `Ok(None)` for a dry run.
    async fn process(
        &self,
        input: &Path,
        opts: &BatchOptions,
        previous: &mut Option<(PathBuf, Show)>,
    ) -> wm_core::Result<Option<PathBuf>> {
        if !input.is_file() {
            return Err(wm_core::Error::Validation(format!(
                "{} is not a file",
                input.display()
            )));
        }
        let id = Identity::resolve(input, opts)?;
        let titles = self.titles(input, &id, previous).await?;
        tracing::info!("title: {}", titles.title);

        let profile = opts.profile.unwrap_or_else(|| Profile::for_kind(id.kind));
        let file_opts = FileOptions {
            profile,
            ..opts.file.clone()
        };
        let plan = self.pipeline.plan(input, &file_opts).await?;

        let base = match &opts.filename {
            Some(name) => format!("{name}{}", profile.output_suffix()),
            None => wm_parser::output_name(input, profile.output_suffix()),
        };
        let dest = opts.output_dir.join(base);

        if opts.dry_run {
            println!("{}", plan.describe().join("\n"));
            println!("  title:   {}", titles.title);
            println!("  summary: {}", titles.summary);
            println!("  output:  {}", dest.display());
            return Ok(None);
        }

        if dest == input {
            return Err(wm_core::Error::Validation(format!(
                "output {} would overwrite the input",
                dest.display()
            )));
        }
        let out = self
            .pipeline
            .encode(&plan, &titles, &file_opts.settings, &dest)
            .await?;

        if opts.delete_original {
            tracing::info!("deleting original {}", input.display());
            std::fs::remove_file(input).map_err(|e| wm_core::Error::cleanup(input, e))?;
        }
        Ok(Some(out))
    }

    async fn titles(
        &self,
        input: &Path,
        id: &Identity,
        previous: &mut Option<(PathBuf, Show)>,
    ) -> wm_core::Result<Titles> {
        match id.kind {
            MediaKind::Movie => Ok(self.metadata.movie(&id.title).await?.titles()),
            MediaKind::Episode => {
                let show = match previous.as_ref() {
                    Some((prev, show)) if wm_parser::is_batch_repeat(prev, input) => {
                        tracing::debug!("reusing show '{}' from {}", show.name, prev.display());
                        show.clone()
                    }
                    _ => self.metadata.show(&id.title).await?,
                };
                let episode = self.metadata.episode(&show, id.season, id.episode).await?;
                let titles = episode.titles(&show);
                *previous = Some((input.to_path_buf(), show));
                Ok(titles)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> BatchOptions {
        BatchOptions {
            output_dir: PathBuf::from("/out"),
            filename: None,
            title: None,
            season: None,
            episode: None,
            profile: None,
            file: FileOptions::new(Profile::Webm),
            delete_original: false,
            dry_run: false,
        }
    }

    #[test]
    fn episode_identity_from_filename() {
        let id = Identity::resolve(Path::new("/in/show.s01e02.mkv"), &opts()).unwrap();
        assert_eq!(id.title, "show");
        assert_eq!(id.kind, MediaKind::Episode);
        assert_eq!((id.season, id.episode), (1, 2));
    }

    #[test]
    fn movie_identity() {
        let id = Identity::resolve(Path::new("Heat (1995).mkv"), &opts()).unwrap();
        assert_eq!(id.title, "Heat");
        assert_eq!(id.kind, MediaKind::Movie);
    }

    #[test]
    fn cli_overrides_win() {
        let o = BatchOptions {
            title: Some("The Show".into()),
            season: Some("3".into()),
            ..opts()
        };
        let id = Identity::resolve(Path::new("show.s01e02.mkv"), &o).unwrap();
        assert_eq!(id.title, "The Show");
        assert_eq!((id.season, id.episode), (3, 2));
    }

    #[test]
    fn half_episode_is_rejected() {
        let o = BatchOptions {
            episode: Some("4".into()),
            ..opts()
        };
        let err = Identity::resolve(Path::new("movie.mkv"), &o).unwrap_err();
        assert!(matches!(err, wm_core::Error::Validation(_)));
    }
}
