//! Baseline lookup
//!
//! A baseline is the last committed content of a file. The annotation engine
//! compares the live buffer against it; how it is fetched is up to a
//! [`BaselineProvider`].

mod git;

pub use git::GitBaselineProvider;

use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;
use thiserror::Error;
use xxhash_rust::xxh64::{Xxh64, xxh64};

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("{0:?} is not tracked at HEAD")]
    NotTracked(PathBuf),

    #[error("No repository found for {0:?}")]
    RepositoryNotFound(PathBuf),

    #[error("Committed content of {path:?} is not valid UTF-8: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: FromUtf8Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("git failed: {0}")]
    Git(String),
}

/// Resolves a file path to its committed lines.
///
/// Called from the background workers, never from the interactive thread.
pub trait BaselineProvider: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<Vec<String>, BaselineError>;
}

impl<F> BaselineProvider for F
where
    F: Fn(&Path) -> Result<Vec<String>, BaselineError> + Send + Sync,
{
    fn resolve(&self, path: &Path) -> Result<Vec<String>, BaselineError> {
        self(path)
    }
}

/// Committed content of a file, captured once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineSnapshot {
    Tracked { lines: Vec<String>, fingerprint: u64 },
    /// The file has no committed version yet
    Untracked,
}

impl BaselineSnapshot {
    pub fn tracked(lines: Vec<String>) -> Self {
        let mut hasher = Xxh64::new(0);
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        Self::Tracked {
            fingerprint: hasher.digest(),
            lines,
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Tracked { .. })
    }

    /// Committed lines; empty for an untracked file
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Tracked { lines, .. } => lines,
            Self::Untracked => &[],
        }
    }

    pub fn fingerprint(&self) -> u64 {
        match self {
            Self::Tracked { fingerprint, .. } => *fingerprint,
            Self::Untracked => 0,
        }
    }
}

/// Why a file cannot be annotated until its baseline is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineUnavailable {
    NoRepository,
    Undecodable,
}

/// Outcome of a baseline lookup, with provider errors sorted into the states
/// the engine handles.
#[derive(Debug)]
pub enum Resolution {
    Ready(BaselineSnapshot),
    Unavailable(BaselineUnavailable),
    Failed(BaselineError),
}

pub fn resolve_baseline(provider: &dyn BaselineProvider, path: &Path) -> Resolution {
    match provider.resolve(path) {
        Ok(lines) => Resolution::Ready(BaselineSnapshot::tracked(lines)),
        Err(BaselineError::NotTracked(_)) => Resolution::Ready(BaselineSnapshot::Untracked),
        Err(BaselineError::RepositoryNotFound(_)) => {
            Resolution::Unavailable(BaselineUnavailable::NoRepository)
        }
        Err(BaselineError::Decode { .. }) => {
            Resolution::Unavailable(BaselineUnavailable::Undecodable)
        }
        Err(e) => Resolution::Failed(e),
    }
}

/// Split text into lines the way the editor shows them.
///
/// A single trailing newline does not start an extra line, and `\r\n` endings
/// lose their `\r`.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Number of lines [`split_lines`] would return, without allocating
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let newlines = text.bytes().filter(|&b| b == b'\n').count();
    if text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Fingerprint of a buffer snapshot
pub fn text_fingerprint(text: &str) -> u64 {
    xxh64(text.as_bytes(), 0)
}
