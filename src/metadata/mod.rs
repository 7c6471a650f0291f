//! Metadata lookup: canonical titles and synopses for the mux.
//!
//! # Module layout
//!
//! - [`tmdb`] -- TMDb v3 client and the [`TmdbLookup`] backend.
//! - [`choose`] -- disambiguation between several search results.
//!
//! [`MetadataLookup`] is the seam the batch processor depends on. Without an
//! API key [`FilenameOnly`] stands in and the parsed filename becomes the
//! title.

pub mod choose;
pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wm_pipeline::Titles;

pub use choose::{Candidate, Chooser, FirstMatch, PromptChooser};
pub use tmdb::{TmdbClient, TmdbLookup};

/// A movie resolved by the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub title: String,
    pub release_date: String,
    pub overview: String,
}

impl MovieInfo {
    pub fn titles(&self) -> Titles {
        Titles {
            title: self.title.clone(),
            summary: self.overview.clone(),
        }
    }
}

/// A TV show resolved by the lookup; reused across files of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    /// Backend identifier, `None` when nothing was looked up.
    pub id: Option<u64>,
    pub name: String,
}

/// One episode of a [`Show`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub air_date: String,
    pub overview: String,
}

impl EpisodeInfo {
    /// `"<show> - S<ss>E<ee> - <episode name>"`.
    pub fn titles(&self, show: &Show) -> Titles {
        let mut title = format!("{} - S{:02}E{:02}", show.name, self.season, self.episode);
        if !self.name.is_empty() {
            title.push_str(" - ");
            title.push_str(&self.name);
        }
        Titles {
            title,
            summary: self.overview.clone(),
        }
    }
}

/// Resolves titles and synopses for movies and episodes.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn movie(&self, title: &str) -> wm_core::Result<MovieInfo>;

    async fn show(&self, title: &str) -> wm_core::Result<Show>;

    async fn episode(&self, show: &Show, season: u32, episode: u32) -> wm_core::Result<EpisodeInfo>;
}

/// Lookup that answers from the filename alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameOnly;

#[async_trait]
impl MetadataLookup for FilenameOnly {
    async fn movie(&self, title: &str) -> wm_core::Result<MovieInfo> {
        Ok(MovieInfo {
            title: title.to_string(),
            release_date: String::new(),
            overview: String::new(),
        })
    }

    async fn show(&self, title: &str) -> wm_core::Result<Show> {
        Ok(Show {
            id: None,
            name: title.to_string(),
        })
    }

    async fn episode(&self, _show: &Show, season: u32, episode: u32) -> wm_core::Result<EpisodeInfo> {
        Ok(EpisodeInfo {
            season,
            episode,
            name: String::new(),
            air_date: String::new(),
            overview: String::new(),
        })
    }
}
