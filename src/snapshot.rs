/*!
 * Snapshot persistence
 *
 * A snapshot is the ordered collection of attribute records for one tree,
 * together with the root it was taken from and whether paths were stored
 * relative to it. Serialized as pretty-printed JSON; absent fields stay
 * absent across a round-trip.
 */

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AttrRecord;

/// File name used when no explicit snapshot path is given.
pub const DEFAULT_SNAPSHOT_NAME: &str = ".saved-file-attrs";

/// Errors around reading or writing the snapshot file. All of these are
/// fatal and map to the snapshot-related exit code.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot file \"{}\" not found", .0.display())]
    NotFound(PathBuf),

    #[error("snapshot path \"{}\" is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("snapshot file \"{}\" is empty", .0.display())]
    Empty(PathBuf),

    #[error("snapshot file \"{}\" contains no records", .0.display())]
    NoRecords(PathBuf),

    #[error("snapshot file \"{}\" has duplicate entry \"{path}\"", .file.display())]
    DuplicatePath { file: PathBuf, path: String },

    #[error("cannot parse snapshot file \"{}\": {source}", .file.display())]
    Format {
        file: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot access snapshot file \"{}\": {source}", .file.display())]
    Io {
        file: PathBuf,
        source: std::io::Error,
    },
}

/// The persisted collection of attribute records for one tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Root the snapshot was taken from
    pub root_path: String,
    /// Whether record paths are stored relative to the root
    pub is_relative: bool,
    /// Records in traversal order
    pub records: Vec<AttrRecord>,

    #[serde(skip)]
    seen: HashSet<String>,
}

impl Snapshot {
    /// A fresh, empty snapshot for a save run.
    pub fn new(root_path: impl Into<String>, is_relative: bool) -> Self {
        Self {
            root_path: root_path.into(),
            is_relative,
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record. Returns `false` without inserting when a record for
    /// the same path already exists; paths are unique within a snapshot.
    pub fn push(&mut self, record: AttrRecord) -> bool {
        if !self.seen.insert(record.path.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Writes the snapshot to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let file = File::create(path).map_err(|source| SnapshotError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|source| {
            SnapshotError::Format {
                file: path.to_path_buf(),
                source,
            }
        })
    }

    /// Reads a snapshot back from `path`, validating it is usable before
    /// anything is applied.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let meta = std::fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::NotFound(path.to_path_buf())
            } else {
                SnapshotError::Io {
                    file: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if meta.is_dir() {
            return Err(SnapshotError::IsDirectory(path.to_path_buf()));
        }
        if meta.len() == 0 {
            return Err(SnapshotError::Empty(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| SnapshotError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        let mut snapshot: Self = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| SnapshotError::Format {
                file: path.to_path_buf(),
                source,
            },
        )?;

        if snapshot.records.is_empty() {
            return Err(SnapshotError::NoRecords(path.to_path_buf()));
        }

        snapshot.seen = HashSet::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            if !snapshot.seen.insert(record.path.clone()) {
                return Err(SnapshotError::DuplicatePath {
                    file: path.to_path_buf(),
                    path: record.path.clone(),
                });
            }
        }

        Ok(snapshot)
    }
}
