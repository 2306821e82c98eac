//! Global error handling for attrsnap
//!
//! This module provides a centralized error type that can represent errors
//! from all modules in the project, together with the process exit code each
//! fatal error maps to.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pattern::PatternError;
use crate::snapshot::SnapshotError;

/// Exit codes reported by the binary.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INTERRUPTED: i32 = 1;
pub const EXIT_GENERIC: i32 = 2;
pub const EXIT_FILE: i32 = 3;
pub const EXIT_SNAPSHOT: i32 = 10;

/// Global error type for attrsnap operations
#[derive(Error, Debug)]
pub enum AttrSnapError {
    /// The working path does not exist or is not a directory
    #[error("working path is not an existing directory: {}", .0.display())]
    Root(PathBuf),

    /// A file-related problem outside the snapshot itself
    #[error("{0}")]
    File(String),

    /// A malformed exclusion rule
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The snapshot file could not be read, written or understood
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Generic I/O failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The user requested a shutdown; the run stopped at the next entry
    #[error("interrupted")]
    Interrupted,

    /// The run finished but some entries could not be processed
    #[error("{0} entries could not be processed")]
    PartialFailure(usize),

    /// Too many entries failed back to back, the run was abandoned
    #[error("too many consecutive errors ({0}), aborting")]
    TooManyErrors(usize),
}

impl AttrSnapError {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Root(_) | Self::File(_) => EXIT_FILE,
            Self::Snapshot(_) => EXIT_SNAPSHOT,
            Self::Interrupted => EXIT_INTERRUPTED,
            Self::Pattern(_)
            | Self::Io(_)
            | Self::PartialFailure(_)
            | Self::TooManyErrors(_) => EXIT_GENERIC,
        }
    }
}

/// Specialized Result type for attrsnap operations
pub type Result<T> = std::result::Result<T, AttrSnapError>;

/// A non-fatal problem with a single filesystem entry.
///
/// Collected and reported at the end of a run; never aborts the run on its
/// own.
#[derive(Debug)]
pub struct EntryError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl EntryError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for EntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<walkdir::Error> for EntryError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
        Self { path, source }
    }
}
