/*!
 * Core types and data structures for the attrsnap application
 */

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of a filesystem entry. Restore never changes an entry's kind; a
/// record is only applied to a target of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or any non-directory, non-link entry)
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// NTFS junction point
    Junction,
}

impl EntryKind {
    /// Classifies a raw file type as reported by `symlink_metadata`.
    pub fn of(file_type: &fs::FileType) -> Self {
        if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_symlink() {
            #[cfg(windows)]
            {
                use std::os::windows::fs::FileTypeExt;
                if file_type.is_symlink_dir() {
                    return Self::Junction;
                }
            }
            Self::Symlink
        } else {
            Self::File
        }
    }

    /// Whether the entry is a symlink or junction.
    pub fn is_link(self) -> bool {
        matches!(self, Self::Symlink | Self::Junction)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Junction => "junction",
        };
        f.write_str(name)
    }
}

/// File ownership identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

/// The three timestamps of an entry, in nanoseconds since the Unix epoch.
/// Any of them can be unavailable on a given platform or filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub created: Option<i64>,
    pub modified: Option<i64>,
    pub accessed: Option<i64>,
}

/// The four platform attribute flags. `None` means the platform does not
/// expose the flag, which is distinct from the flag being unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub archive: Option<bool>,
    pub hidden: Option<bool>,
    pub readonly: Option<bool>,
    pub system: Option<bool>,
}

impl Flags {
    pub fn is_empty(&self) -> bool {
        self.archive.is_none()
            && self.hidden.is_none()
            && self.readonly.is_none()
            && self.system.is_none()
    }
}

/// Captured metadata for one filesystem entry.
///
/// Every field other than `path` and `kind` is optional: capture failures
/// and platform gaps are stored as absence, never as a default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrRecord {
    /// Path exactly as configured at save time, relative or absolute
    pub path: String,
    /// Kind of the entry when it was captured
    pub kind: EntryKind,
    /// Permission bits (POSIX mode)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mode: Option<u32>,
    /// Owning user and group
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<Owner>,
    /// Creation time, nanoseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created: Option<i64>,
    /// Modification time, nanoseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub modified: Option<i64>,
    /// Access time, nanoseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accessed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub archive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system: Option<bool>,
}

impl AttrRecord {
    /// The flag fields as a [`Flags`] value.
    pub fn flags(&self) -> Flags {
        Flags {
            archive: self.archive,
            hidden: self.hidden,
            readonly: self.readonly,
            system: self.system,
        }
    }

    /// The timestamp fields as a [`Timestamps`] value.
    pub fn timestamps(&self) -> Timestamps {
        Timestamps {
            created: self.created,
            modified: self.modified,
            accessed: self.accessed,
        }
    }
}

/// One entry yielded by the tree walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Full path of the entry, rooted at the walk root
    pub path: PathBuf,
    /// Path relative to the walk root
    pub rel_path: PathBuf,
    /// Kind of the entry
    pub kind: EntryKind,
}
