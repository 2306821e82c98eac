/*!
 * Attribute capture and apply engine
 *
 * Maps a filesystem entry to a portable [`AttrRecord`] and back. Capture
 * tolerates per-field gaps; apply reads the target first and only writes the
 * fields that actually differ, so an unchanged tree is left untouched. The
 * engine never creates or deletes entries and never changes an entry's kind.
 */

use std::fs;
use std::path::Path;

use crate::error::EntryError;
use crate::platform::{AttributeAccessor, FieldError};
use crate::types::{AttrRecord, EntryKind, Flags, Timestamps, WalkEntry};

/// One attribute field, for change and failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Permissions,
    Owner,
    Created,
    Modified,
    Accessed,
    Archive,
    Hidden,
    Readonly,
    System,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Permissions => "permissions",
            Self::Owner => "owner",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Accessed => "accessed",
            Self::Archive => "archive",
            Self::Hidden => "hidden",
            Self::Readonly => "read-only",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

/// A single field write that failed while the rest of the entry went through.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: Field,
    pub message: String,
}

impl FieldFailure {
    fn new(field: Field, error: &dyn std::fmt::Display) -> Self {
        Self {
            field,
            message: error.to_string(),
        }
    }
}

/// Why a record was not applied. Skips are successful outcomes, reported
/// separately from failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target path no longer exists
    Missing,
    /// The target exists but is a different kind of entry now
    KindMismatch {
        expected: EntryKind,
        found: EntryKind,
    },
    /// The platform cannot address a link without following it
    UnsupportedLink,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "non-existent item"),
            Self::KindMismatch { expected, found } => {
                write!(f, "kind mismatch: saved as {expected}, now a {found}")
            }
            Self::UnsupportedLink => write!(f, "symbolic link not supported here"),
        }
    }
}

/// Result of applying one record to one target path.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The entry was processed; `changes` lists the fields written and
    /// `failures` the fields that could not be written.
    Applied {
        changes: Vec<Field>,
        failures: Vec<FieldFailure>,
    },
    /// The entry was deliberately left alone.
    Skipped(SkipReason),
    /// The entry could not even be inspected.
    Failed(EntryError),
}

/// Per-field switches for the restore side. Everything is restored unless
/// explicitly skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    skip_permissions: bool,
    skip_owner: bool,
    skip_created: bool,
    skip_modified: bool,
    skip_accessed: bool,
    skip_archive: bool,
    skip_hidden: bool,
    skip_readonly: bool,
    skip_system: bool,
    copy_to_access: bool,
}

impl RestoreOptions {
    pub const fn new() -> Self {
        Self {
            skip_permissions: false,
            skip_owner: false,
            skip_created: false,
            skip_modified: false,
            skip_accessed: false,
            skip_archive: false,
            skip_hidden: false,
            skip_readonly: false,
            skip_system: false,
            copy_to_access: false,
        }
    }

    pub const fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub const fn skip_owner(mut self, skip: bool) -> Self {
        self.skip_owner = skip;
        self
    }

    pub const fn skip_created(mut self, skip: bool) -> Self {
        self.skip_created = skip;
        self
    }

    pub const fn skip_modified(mut self, skip: bool) -> Self {
        self.skip_modified = skip;
        self
    }

    pub const fn skip_accessed(mut self, skip: bool) -> Self {
        self.skip_accessed = skip;
        self
    }

    pub const fn skip_archive(mut self, skip: bool) -> Self {
        self.skip_archive = skip;
        self
    }

    pub const fn skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    pub const fn skip_readonly(mut self, skip: bool) -> Self {
        self.skip_readonly = skip;
        self
    }

    pub const fn skip_system(mut self, skip: bool) -> Self {
        self.skip_system = skip;
        self
    }

    /// Restore the creation time into the accessed time instead of the
    /// record's own accessed value.
    pub const fn copy_to_access(mut self, copy: bool) -> Self {
        self.copy_to_access = copy;
        self
    }
}

/// Captures the attributes of one walked entry into a record.
///
/// Individual fields the platform cannot provide are stored as absent. An
/// entry whose metadata cannot be read at all is an error; the caller reports
/// it and moves on.
pub fn capture<A: AttributeAccessor>(
    entry: &WalkEntry,
    stored_path: String,
    accessor: &A,
) -> Result<AttrRecord, EntryError> {
    let timestamps = match accessor.timestamps(&entry.path) {
        Ok(timestamps) => timestamps,
        Err(FieldError::Unsupported) => Timestamps::default(),
        Err(FieldError::Io(err)) => return Err(EntryError::new(&entry.path, err)),
    };

    let mode = accessor.permissions(&entry.path).ok();
    let owner = accessor.owner(&entry.path).ok();
    let flags = accessor.flags(&entry.path).unwrap_or_default();

    Ok(AttrRecord {
        path: stored_path,
        kind: entry.kind,
        mode,
        owner,
        created: timestamps.created,
        modified: timestamps.modified,
        accessed: timestamps.accessed,
        archive: flags.archive,
        hidden: flags.hidden,
        readonly: flags.readonly,
        system: flags.system,
    })
}

/// The desired value when it differs from the current one.
fn wanted(want: Option<i64>, current: Option<i64>) -> Option<i64> {
    want.filter(|value| current != Some(*value))
}

/// Applies one record to `target`, writing only the fields that differ and
/// honouring the per-field skip switches.
pub fn apply<A: AttributeAccessor>(
    record: &AttrRecord,
    target: &Path,
    accessor: &A,
    options: &RestoreOptions,
) -> ApplyOutcome {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return ApplyOutcome::Skipped(SkipReason::Missing);
        }
        Err(err) => return ApplyOutcome::Failed(EntryError::new(target, err)),
    };

    let kind = EntryKind::of(&meta.file_type());
    if kind != record.kind {
        return ApplyOutcome::Skipped(SkipReason::KindMismatch {
            expected: record.kind,
            found: kind,
        });
    }

    // Windows cannot retarget attributes of a link without following it.
    if kind.is_link() && cfg!(windows) {
        return ApplyOutcome::Skipped(SkipReason::UnsupportedLink);
    }

    let mut changes = Vec::new();
    let mut failures = Vec::new();

    if !options.skip_permissions {
        if let Some(mode) = record.mode {
            match accessor.permissions(target) {
                Ok(current) if current == mode => {}
                Ok(_) => match accessor.set_permissions(target, mode, kind) {
                    Ok(()) => changes.push(Field::Permissions),
                    Err(FieldError::Unsupported) => {}
                    Err(FieldError::Io(err)) => {
                        failures.push(FieldFailure::new(Field::Permissions, &err));
                    }
                },
                Err(FieldError::Unsupported) => {}
                Err(FieldError::Io(err)) => {
                    failures.push(FieldFailure::new(Field::Permissions, &err));
                }
            }
        }
    }

    if !options.skip_owner {
        if let Some(owner) = record.owner {
            match accessor.owner(target) {
                Ok(current) if current == owner => {}
                Ok(_) => match accessor.set_owner(target, owner, kind) {
                    Ok(()) => changes.push(Field::Owner),
                    Err(FieldError::Unsupported) => {}
                    Err(FieldError::Io(err)) => {
                        failures.push(FieldFailure::new(Field::Owner, &err));
                    }
                },
                Err(FieldError::Unsupported) => {}
                Err(FieldError::Io(err)) => {
                    failures.push(FieldFailure::new(Field::Owner, &err));
                }
            }
        }
    }

    apply_timestamps(record, target, accessor, options, kind, &mut changes, &mut failures);
    apply_flags(record, target, accessor, options, kind, &mut changes, &mut failures);

    ApplyOutcome::Applied { changes, failures }
}

fn apply_timestamps<A: AttributeAccessor>(
    record: &AttrRecord,
    target: &Path,
    accessor: &A,
    options: &RestoreOptions,
    kind: EntryKind,
    changes: &mut Vec<Field>,
    failures: &mut Vec<FieldFailure>,
) {
    let current = match accessor.timestamps(target) {
        Ok(current) => current,
        Err(FieldError::Unsupported) => return,
        Err(FieldError::Io(err)) => {
            failures.push(FieldFailure::new(Field::Modified, &err));
            return;
        }
    };

    let want_modified = if options.skip_modified {
        None
    } else {
        record.modified
    };
    let mut want_accessed = if options.skip_accessed {
        None
    } else {
        record.accessed
    };
    if options.copy_to_access && !options.skip_accessed {
        if let Some(created) = record.created {
            want_accessed = Some(created);
        }
    }
    let want_created = if options.skip_created {
        None
    } else {
        record.created
    };

    let set_modified = wanted(want_modified, current.modified);
    let set_accessed = wanted(want_accessed, current.accessed);

    if set_modified.is_some() || set_accessed.is_some() {
        // Access and modification times travel together; the unchanged one
        // keeps its current value.
        let accessed = set_accessed
            .or(current.accessed)
            .or(record.accessed)
            .unwrap_or_default();
        let modified = set_modified
            .or(current.modified)
            .or(record.modified)
            .unwrap_or_default();
        match accessor.set_file_times(target, accessed, modified, kind) {
            Ok(()) => {
                if set_modified.is_some() {
                    changes.push(Field::Modified);
                }
                if set_accessed.is_some() {
                    changes.push(Field::Accessed);
                }
            }
            Err(FieldError::Unsupported) => {}
            Err(FieldError::Io(err)) => {
                if set_modified.is_some() {
                    failures.push(FieldFailure::new(Field::Modified, &err));
                }
                if set_accessed.is_some() {
                    failures.push(FieldFailure::new(Field::Accessed, &err));
                }
            }
        }
    }

    if let Some(created) = wanted(want_created, current.created) {
        match accessor.set_created(target, created, kind) {
            Ok(()) => changes.push(Field::Created),
            Err(FieldError::Unsupported) => {}
            Err(FieldError::Io(err)) => failures.push(FieldFailure::new(Field::Created, &err)),
        }
    }
}

fn apply_flags<A: AttributeAccessor>(
    record: &AttrRecord,
    target: &Path,
    accessor: &A,
    options: &RestoreOptions,
    kind: EntryKind,
    changes: &mut Vec<Field>,
    failures: &mut Vec<FieldFailure>,
) {
    if record.flags().is_empty() {
        return;
    }

    let current = match accessor.flags(target) {
        Ok(current) => current,
        // A platform that cannot read the flags cannot write them either.
        Err(FieldError::Unsupported) => return,
        Err(FieldError::Io(err)) => {
            failures.push(FieldFailure::new(Field::Archive, &err));
            return;
        }
    };

    let keep = |skip: bool, want: Option<bool>, cur: Option<bool>| {
        if skip {
            None
        } else {
            want.filter(|value| cur != Some(*value))
        }
    };

    let desired = Flags {
        archive: keep(options.skip_archive, record.archive, current.archive),
        hidden: keep(options.skip_hidden, record.hidden, current.hidden),
        readonly: keep(options.skip_readonly, record.readonly, current.readonly),
        system: keep(options.skip_system, record.system, current.system),
    };

    if desired.is_empty() {
        return;
    }

    let touched: Vec<Field> = [
        (Field::Archive, desired.archive),
        (Field::Hidden, desired.hidden),
        (Field::Readonly, desired.readonly),
        (Field::System, desired.system),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|_| field))
    .collect();

    match accessor.set_flags(target, desired, kind) {
        Ok(()) => changes.extend(touched),
        Err(FieldError::Unsupported) => {}
        Err(FieldError::Io(err)) => {
            let message = err.to_string();
            failures.extend(touched.into_iter().map(|field| FieldFailure {
                field,
                message: message.clone(),
            }));
        }
    }
}
