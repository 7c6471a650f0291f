//! Output types for the filename parser.

use serde::{Deserialize, Serialize};

/// What the filename says about an input.
///
/// # Examples
///
/// ```
/// let p = wm_parser::parse("tvShow.s01e48.mkv");
/// assert_eq!(p.title, "tvShow");
/// assert_eq!(p.season.as_deref(), Some("01"));
/// assert_eq!(p.episode.as_deref(), Some("48"));
/// assert!(!p.is_movie());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    /// Text before the first `(` or `.` of the bare filename.
    pub title: String,

    /// Season number, zero-padded to at least two digits.
    pub season: Option<String>,

    /// Episode number, zero-padded to at least two digits.
    pub episode: Option<String>,
}

impl ParsedName {
    /// Neither a season nor an episode was found.
    pub fn is_movie(&self) -> bool {
        self.season.is_none() && self.episode.is_none()
    }
}
