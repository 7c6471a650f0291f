//! wm-parser: title, season and episode extraction from media filenames.
//!
//! Only the bare file name is considered; any directory part of the input is
//! dropped first, so `/home/test/title1.mkv` and `c:/Program Files/title2.mkv`
//! parse the same as `title1.mkv` and `title2.mkv`.
//!
//! # Quick start
//!
//! ```
//! use wm_parser::parse;
//!
//! let r = parse("program.S7E11.webm");
//! assert_eq!(r.title, "program");
//! assert_eq!(r.season.as_deref(), Some("07"));
//! assert_eq!(r.episode.as_deref(), Some("11"));
//! ```

pub mod types;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

pub use types::ParsedName;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)[(.]").expect("valid regex"));
static SEASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W[sS]([0-9]+)").expect("valid regex"));
static EPISODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[eE]([0-9]+)").expect("valid regex"));

/// Parse everything the filename offers.
pub fn parse(file: impl AsRef<Path>) -> ParsedName {
    let name = bare_name(file.as_ref());
    ParsedName {
        title: title_of(&name),
        season: number_after(&SEASON_RE, &name),
        episode: number_after(&EPISODE_RE, &name),
    }
}

/// The title: text before the first `(` or `.`. A name with neither is its
/// own title.
pub fn title(file: impl AsRef<Path>) -> String {
    title_of(&bare_name(file.as_ref()))
}

/// Season number following `s`/`S` after a non-word character.
pub fn season(file: impl AsRef<Path>) -> Option<String> {
    number_after(&SEASON_RE, &bare_name(file.as_ref()))
}

/// Episode number following `e`/`E` after a digit.
pub fn episode(file: impl AsRef<Path>) -> Option<String> {
    number_after(&EPISODE_RE, &bare_name(file.as_ref()))
}

/// No season and no episode: treat the input as a movie.
pub fn is_movie(file: impl AsRef<Path>) -> bool {
    parse(file).is_movie()
}

/// Whether two inputs belong to the same title, so metadata chosen for the
/// first can be reused for the second.
pub fn is_batch_repeat(first: impl AsRef<Path>, second: impl AsRef<Path>) -> bool {
    let (first, second) = (first.as_ref(), second.as_ref());
    if first.as_os_str().is_empty() || second.as_os_str().is_empty() {
        return false;
    }
    title(first) == title(second)
}

/// Default output name: the input's stem with `suffix` appended.
///
/// ```
/// assert_eq!(wm_parser::output_name("/in/show.s01e02.mkv", ".webm"), "show.s01e02.webm");
/// ```
pub fn output_name(file: impl AsRef<Path>, suffix: &str) -> String {
    let stem = file
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}{suffix}")
}

fn bare_name(file: &Path) -> String {
    // Windows-style separators are not path separators on unix.
    let full = file.to_string_lossy();
    let tail = full.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();
    tail.to_string()
}

fn title_of(name: &str) -> String {
    TITLE_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}

fn number_after(re: &Regex, name: &str) -> Option<String> {
    let digits = re.captures(name)?.get(1)?.as_str();
    Some(zero_pad(digits))
}

fn zero_pad(digits: &str) -> String {
    if digits.len() == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    }
}
