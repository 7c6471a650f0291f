//! Per-file workspace and artifact handling.
//!
//! A [`Workspace`] owns a scratch directory for the intermediate artifacts of
//! one input file. It lives next to the output so that renames into place
//! stay on one filesystem. Dropping the workspace removes the directory and
//! everything left in it; [`Workspace::preserve`] keeps it for inspection.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Who owns an artifact's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Produced by an encode job; deleted once no consumer needs it.
    Intermediate,
    /// Owned by the caller (source media, the muxed result). Never deleted
    /// by the pipeline.
    Final,
}

/// A file produced or consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    path: PathBuf,
    lifecycle: Lifecycle,
}

impl Artifact {
    /// An intermediate artifact at `path`.
    pub fn intermediate(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lifecycle: Lifecycle::Intermediate,
        }
    }

    /// A caller-owned artifact at `path`.
    pub fn owned_by_caller(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lifecycle: Lifecycle::Final,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_intermediate(&self) -> bool {
        self.lifecycle == Lifecycle::Intermediate
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Workspace for one input file's pipeline.
///
/// # Example
///
/// ```no_run
/// use wm_av::Workspace;
/// use std::path::Path;
///
/// let ws = Workspace::new(Path::new("/media/show.s01e02.mkv"), Path::new("/out")).unwrap();
/// let audio = ws.intermediate("audio.opus");
/// // ... encode into audio.path(), mux into ws.output("webm") ...
/// let muxed = ws.output("webm");
/// ws.finalize_file(&muxed, Path::new("/out/show.s01e02.webm")).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
}

impl Workspace {
    /// Create a workspace for `input`, with its scratch directory inside
    /// `output_dir`.
    pub fn new(input: &Path, output_dir: &Path) -> wm_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(".webmify-")
            .tempdir_in(output_dir)
            .map_err(|e| wm_core::Error::Tool {
                tool: "workspace".to_string(),
                message: format!(
                    "failed to create scratch dir in {}: {e}",
                    output_dir.display()
                ),
            })?;

        Ok(Self {
            temp_dir,
            input_path: input.to_path_buf(),
        })
    }

    /// The original input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// The source media as an artifact.
    pub fn source(&self) -> Artifact {
        Artifact::owned_by_caller(&self.input_path)
    }

    /// Path to the scratch directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// A named intermediate artifact inside the workspace.
    pub fn intermediate(&self, name: &str) -> Artifact {
        Artifact::intermediate(self.temp_file(name))
    }

    /// Where the mux writes before the result is moved into place.
    pub fn output(&self, extension: &str) -> PathBuf {
        let stem = self
            .input_path
            .file_stem()
            .unwrap_or_else(|| std::ffi::OsStr::new("output"));
        let mut name = stem.to_os_string();
        name.push(".muxed.");
        name.push(extension);
        self.temp_dir.path().join(name)
    }

    /// Delete an intermediate artifact.
    ///
    /// # Errors
    ///
    /// Caller-owned artifacts are refused with [`wm_core::Error::Internal`];
    /// a failing unlink is [`wm_core::Error::ArtifactCleanup`].
    pub fn remove(&self, artifact: &Artifact) -> wm_core::Result<()> {
        if !artifact.is_intermediate() {
            return Err(wm_core::Error::Internal(format!(
                "refusing to delete caller-owned artifact {}",
                artifact.path().display()
            )));
        }
        tracing::debug!("delete {}", artifact.path().display());
        std::fs::remove_file(artifact.path())
            .map_err(|e| wm_core::Error::cleanup(artifact.path(), e))
    }

    /// Move an intermediate artifact aside under a new name in the same
    /// directory, returning the renamed artifact.
    pub fn rename(&self, artifact: &Artifact, new_name: &str) -> wm_core::Result<Artifact> {
        if !artifact.is_intermediate() {
            return Err(wm_core::Error::Internal(format!(
                "refusing to rename caller-owned artifact {}",
                artifact.path().display()
            )));
        }
        let dest = artifact
            .path()
            .parent()
            .unwrap_or_else(|| self.temp_dir.path())
            .join(new_name);
        tracing::debug!("rename {} -> {}", artifact.path().display(), dest.display());
        std::fs::rename(artifact.path(), &dest)
            .map_err(|e| wm_core::Error::cleanup(artifact.path(), e))?;
        Ok(Artifact::intermediate(dest))
    }

    /// Move a finished file from the workspace to `dest`, then drop the
    /// workspace.
    ///
    /// Tries a rename first (same filesystem), falling back to copy+remove.
    ///
    /// # Errors
    ///
    /// Returns an error if `produced` does not exist or the move fails.
    pub fn finalize_file(self, produced: &Path, dest: &Path) -> wm_core::Result<PathBuf> {
        if !produced.exists() {
            return Err(wm_core::Error::Tool {
                tool: "workspace".to_string(),
                message: format!("output file does not exist: {}", produced.display()),
            });
        }

        if let Err(_rename_err) = std::fs::rename(produced, dest) {
            std::fs::copy(produced, dest).map_err(|e| wm_core::Error::Tool {
                tool: "workspace".to_string(),
                message: format!("failed to copy output to destination: {e}"),
            })?;
            std::fs::remove_file(produced).map_err(|e| wm_core::Error::cleanup(produced, e))?;
        }

        Ok(dest.to_path_buf())
    }

    /// Keep the scratch directory on disk and return its path.
    pub fn preserve(self) -> PathBuf {
        self.temp_dir.keep()
    }
}
