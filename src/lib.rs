/*!
 * attrsnap - Save and restore file attributes in a directory tree
 *
 * This library captures filesystem metadata (permissions, ownership,
 * timestamps, platform attribute flags) for every entry under a root into a
 * snapshot, and applies a snapshot back onto a tree. Exclusions use
 * gitignore-compatible pattern rules with traversal-time pruning.
 */

pub mod attrs;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod pattern;
pub mod platform;
pub mod report;
pub mod run;
pub mod snapshot;
pub mod types;
pub mod walker;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use attrs::{apply, capture, ApplyOutcome, Field, RestoreOptions, SkipReason};
pub use config::{Args, Command, RestoreConfig, SaveConfig};
pub use error::{AttrSnapError, EntryError, Result};
pub use pattern::{PatternError, RuleSet};
pub use platform::{AttributeAccessor, FieldError, FsAccessor};
pub use report::{Reporter, RunSummary};
pub use run::{run_restore, run_save};
pub use snapshot::{Snapshot, SnapshotError, DEFAULT_SNAPSHOT_NAME};
pub use types::{AttrRecord, EntryKind, Flags, Owner, Timestamps, WalkEntry};
pub use walker::{WalkOptions, Walker};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
