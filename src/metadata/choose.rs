//! Picking one of several search results.

use std::io::{BufRead, Write};
use std::sync::Mutex;

/// A search result offered for disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    /// First four characters of the release or first-air date.
    pub year: String,
    /// `movie` or `tv`; used for the reference URL.
    pub kind: &'static str,
}

impl Candidate {
    pub fn url(&self) -> String {
        format!("https://www.themoviedb.org/{}/{}", self.kind, self.id)
    }
}

/// Chooses between two or more candidates.
pub trait Chooser: Send + Sync {
    /// Index into `candidates` of the chosen result.
    fn choose(&self, candidates: &[Candidate]) -> wm_core::Result<usize>;
}

/// Always takes the first result.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl Chooser for FirstMatch {
    fn choose(&self, _candidates: &[Candidate]) -> wm_core::Result<usize> {
        Ok(0)
    }
}

/// Prints a numbered list and reads the selection from a reader (stdin by
/// default).
pub struct PromptChooser<R, W> {
    io: Mutex<(R, W)>,
}

impl PromptChooser<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptChooser<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Chooser for PromptChooser<R, W> {
    fn choose(&self, candidates: &[Candidate]) -> wm_core::Result<usize> {
        let mut guard = self
            .io
            .lock()
            .map_err(|_| wm_core::Error::Internal("prompt lock poisoned".into()))?;
        let (reader, writer) = &mut *guard;

        writeln!(writer, "\nMultiple matches found. Select from:")?;
        for (i, c) in candidates.iter().enumerate() {
            writeln!(writer, "[{i}]: {}, {} ({})", c.name, c.year, c.url())?;
        }
        write!(writer, "Result number: ")?;
        writer.flush()?;

        let mut line = String::new();
        reader.read_line(&mut line)?;
        match line.trim().parse::<usize>() {
            Ok(i) if i < candidates.len() => Ok(i),
            _ => Err(wm_core::Error::Metadata(format!(
                "invalid selection {:?}; expected 0-{}",
                line.trim(),
                candidates.len().saturating_sub(1)
            ))),
        }
    }
}
