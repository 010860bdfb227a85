//! Where recordings go and where playback reads from.
//!
//! A [`PathPrompt`] stands in for a file dialog. Returning `None` means the
//! user cancelled, which callers treat as a no-op rather than an error.

use crate::{MacroError, Result};
use chrono::Local;
use std::{
    io::{BufRead, Write},
    path::PathBuf,
};
use tracing::debug;

/// What the selected path will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Save,
    Open,
}

/// File selection collaborator
pub trait PathPrompt: Send + Sync {
    fn select(&self, purpose: PromptPurpose) -> Result<Option<PathBuf>>;
}

/// A path chosen up front, or an already cancelled selection
#[derive(Debug, Clone, Default)]
pub struct FixedPath(Option<PathBuf>);

impl FixedPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    pub fn cancelled() -> Self {
        Self(None)
    }
}

impl PathPrompt for FixedPath {
    fn select(&self, _purpose: PromptPurpose) -> Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Asks for a path on the terminal; an empty answer cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl PathPrompt for StdinPrompt {
    fn select(&self, purpose: PromptPurpose) -> Result<Option<PathBuf>> {
        let question = match purpose {
            PromptPurpose::Save => "Save recording to (empty to discard): ",
            PromptPurpose::Open => "Timeline file to run (empty to cancel): ",
        };

        let mut stdout = std::io::stdout();
        stdout
            .write_all(question.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| MacroError::io("<stdout>", e))?;

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| MacroError::io("<stdin>", e))?;

        Ok(parse_answer(&answer))
    }
}

fn parse_answer(answer: &str) -> Option<PathBuf> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// Names each saved recording after the time it was saved, inside one directory
#[derive(Debug, Clone)]
pub struct TimestampedPath {
    dir: PathBuf,
}

impl TimestampedPath {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PathPrompt for TimestampedPath {
    fn select(&self, purpose: PromptPurpose) -> Result<Option<PathBuf>> {
        if purpose == PromptPurpose::Open {
            debug!("Timestamped paths only name new recordings");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| MacroError::io(&self.dir, e))?;
        let name = format!("macro-{}.json", Local::now().format("%Y%m%d-%H%M%S"));
        Ok(Some(self.dir.join(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fixed_path() {
        let prompt = FixedPath::new("macro.json");
        assert_eq!(
            prompt.select(PromptPurpose::Save).unwrap(),
            Some(PathBuf::from("macro.json"))
        );
        assert_eq!(FixedPath::cancelled().select(PromptPurpose::Open).unwrap(), None);
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("  \n"), None);
        assert_eq!(parse_answer("out.json\n"), Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_timestamped_path() {
        let dir = tempdir().unwrap();
        let prompt = TimestampedPath::new(dir.path().join("recordings"));

        let path = prompt.select(PromptPurpose::Save).unwrap().unwrap();
        assert!(path.starts_with(dir.path().join("recordings")));
        assert!(dir.path().join("recordings").is_dir());

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("macro-"));
        assert!(name.ends_with(".json"));

        assert_eq!(prompt.select(PromptPurpose::Open).unwrap(), None);
    }
}
