/*!
 * Platform attribute accessor
 *
 * Raw per-field reads and writes of filesystem metadata. Every operation is
 * independently fallible, and a platform that cannot express a field reports
 * [`FieldError::Unsupported`] instead of pretending with a default value.
 * Handles are opened immediately before a single read or write and released
 * before the next entry is touched.
 */

use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use filetime::FileTime;
use thiserror::Error;

use crate::types::{EntryKind, Flags, Owner, Timestamps};

/// Why a single attribute read or write did not happen.
#[derive(Error, Debug)]
pub enum FieldError {
    /// The platform has no notion of this attribute (or cannot reach it on
    /// this kind of entry). Not a failure.
    #[error("unsupported on this platform")]
    Unsupported,
    /// A real I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of a single attribute operation.
pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// Capability interface for raw attribute access.
///
/// The capture/apply engine only talks to the filesystem through this trait,
/// which keeps the symlink and platform special cases in one place.
pub trait AttributeAccessor {
    /// Permission bits of the entry, without following symlinks.
    fn permissions(&self, path: &Path) -> FieldResult<u32>;

    /// Writes permission bits. Symlink permissions are not portable and are
    /// reported as unsupported.
    fn set_permissions(&self, path: &Path, mode: u32, kind: EntryKind) -> FieldResult<()>;

    /// Owning user and group of the entry, without following symlinks.
    fn owner(&self, path: &Path) -> FieldResult<Owner>;

    /// Writes ownership, targeting the link itself for link entries.
    fn set_owner(&self, path: &Path, owner: Owner, kind: EntryKind) -> FieldResult<()>;

    /// The three timestamps of the entry, without following symlinks.
    fn timestamps(&self, path: &Path) -> FieldResult<Timestamps>;

    /// Writes access and modification times together, targeting the link
    /// itself for link entries.
    fn set_file_times(
        &self,
        path: &Path,
        accessed: i64,
        modified: i64,
        kind: EntryKind,
    ) -> FieldResult<()>;

    /// Writes the creation time. Only Windows can do this.
    fn set_created(&self, path: &Path, created: i64, kind: EntryKind) -> FieldResult<()>;

    /// The four attribute flags of the entry.
    fn flags(&self, path: &Path) -> FieldResult<Flags>;

    /// Forces the flags that are `Some` to the given values, leaving the
    /// others as they are.
    fn set_flags(&self, path: &Path, flags: Flags, kind: EntryKind) -> FieldResult<()>;
}

/// Converts nanoseconds since the Unix epoch into a [`FileTime`].
fn file_time(nanos: i64) -> FileTime {
    FileTime::from_unix_time(
        nanos.div_euclid(1_000_000_000),
        nanos.rem_euclid(1_000_000_000) as u32,
    )
}

/// Converts a [`SystemTime`] into nanoseconds since the Unix epoch.
fn system_time_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i64,
        Err(before) => -(before.duration().as_nanos() as i64),
    }
}

/// The real filesystem-backed accessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAccessor;

impl FsAccessor {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    use rustix::fs::{chownat, AtFlags, CWD};

    fn uid_from_raw(raw: rustix::process::RawUid) -> rustix::fs::Uid {
        unsafe { rustix::fs::Uid::from_raw(raw) }
    }

    fn gid_from_raw(raw: rustix::process::RawGid) -> rustix::fs::Gid {
        unsafe { rustix::fs::Gid::from_raw(raw) }
    }

    impl AttributeAccessor for FsAccessor {
        fn permissions(&self, path: &Path) -> FieldResult<u32> {
            let meta = std::fs::symlink_metadata(path)?;
            Ok(meta.mode() & 0o7777)
        }

        fn set_permissions(&self, path: &Path, mode: u32, kind: EntryKind) -> FieldResult<()> {
            if kind.is_link() {
                // chmod would follow the link; Linux has no lchmod.
                return Err(FieldError::Unsupported);
            }
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
            Ok(())
        }

        fn owner(&self, path: &Path) -> FieldResult<Owner> {
            let meta = std::fs::symlink_metadata(path)?;
            Ok(Owner {
                uid: meta.uid(),
                gid: meta.gid(),
            })
        }

        fn set_owner(&self, path: &Path, owner: Owner, kind: EntryKind) -> FieldResult<()> {
            let flags = if kind.is_link() {
                AtFlags::SYMLINK_NOFOLLOW
            } else {
                AtFlags::empty()
            };
            chownat(
                CWD,
                path,
                Some(uid_from_raw(owner.uid)),
                Some(gid_from_raw(owner.gid)),
                flags,
            )
            .map_err(|errno| FieldError::Io(io::Error::from(errno)))
        }

        fn timestamps(&self, path: &Path) -> FieldResult<Timestamps> {
            let meta = std::fs::symlink_metadata(path)?;
            Ok(Timestamps {
                created: meta.created().ok().map(system_time_nanos),
                modified: Some(meta.mtime() * 1_000_000_000 + meta.mtime_nsec()),
                accessed: Some(meta.atime() * 1_000_000_000 + meta.atime_nsec()),
            })
        }

        fn set_file_times(
            &self,
            path: &Path,
            accessed: i64,
            modified: i64,
            kind: EntryKind,
        ) -> FieldResult<()> {
            let atime = file_time(accessed);
            let mtime = file_time(modified);
            if kind.is_link() {
                filetime::set_symlink_file_times(path, atime, mtime)?;
            } else {
                filetime::set_file_times(path, atime, mtime)?;
            }
            Ok(())
        }

        fn set_created(&self, _path: &Path, _created: i64, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn flags(&self, _path: &Path) -> FieldResult<Flags> {
            Err(FieldError::Unsupported)
        }

        fn set_flags(&self, _path: &Path, _flags: Flags, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use std::os::windows::ffi::OsStrExt;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, FILETIME, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, GetFileAttributesW, SetFileAttributesW, SetFileTime,
        FILE_ATTRIBUTE_ARCHIVE, FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_READONLY,
        FILE_ATTRIBUTE_SYSTEM, FILE_FLAGS_AND_ATTRIBUTES, FILE_FLAG_BACKUP_SEMANTICS,
        FILE_FLAG_OPEN_REPARSE_POINT, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
        FILE_WRITE_ATTRIBUTES, INVALID_FILE_ATTRIBUTES, OPEN_EXISTING,
    };

    // Seconds between 1601-01-01 and 1970-01-01.
    const WINDOWS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

    fn wide(path: &Path) -> Vec<u16> {
        path.as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    fn win_err(err: windows::core::Error) -> FieldError {
        FieldError::Io(io::Error::new(io::ErrorKind::Other, err))
    }

    fn filetime_from_nanos(nanos: i64) -> FILETIME {
        let intervals = nanos / 100 + WINDOWS_EPOCH_OFFSET_SECS * 10_000_000;
        FILETIME {
            dwLowDateTime: (intervals as u64 & 0xFFFF_FFFF) as u32,
            dwHighDateTime: (intervals as u64 >> 32) as u32,
        }
    }

    fn raw_attributes(path: &Path) -> FieldResult<u32> {
        let wide = wide(path);
        let attrs = unsafe { GetFileAttributesW(PCWSTR(wide.as_ptr())) };
        if attrs == INVALID_FILE_ATTRIBUTES {
            return Err(FieldError::Io(io::Error::last_os_error()));
        }
        Ok(attrs)
    }

    fn attribute_handle(path: &Path, kind: EntryKind) -> FieldResult<HANDLE> {
        let open_flags = if kind.is_link() {
            FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OPEN_REPARSE_POINT
        } else {
            FILE_FLAG_BACKUP_SEMANTICS
        };
        let wide = wide(path);
        unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                FILE_WRITE_ATTRIBUTES.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                open_flags,
                HANDLE::default(),
            )
        }
        .map_err(win_err)
    }

    impl AttributeAccessor for FsAccessor {
        fn permissions(&self, _path: &Path) -> FieldResult<u32> {
            // The read-only bit is carried by the flags instead.
            Err(FieldError::Unsupported)
        }

        fn set_permissions(&self, _path: &Path, _mode: u32, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn owner(&self, _path: &Path) -> FieldResult<Owner> {
            Err(FieldError::Unsupported)
        }

        fn set_owner(&self, _path: &Path, _owner: Owner, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn timestamps(&self, path: &Path) -> FieldResult<Timestamps> {
            let meta = std::fs::symlink_metadata(path)?;
            Ok(Timestamps {
                created: meta.created().ok().map(system_time_nanos),
                modified: meta.modified().ok().map(system_time_nanos),
                accessed: meta.accessed().ok().map(system_time_nanos),
            })
        }

        fn set_file_times(
            &self,
            path: &Path,
            accessed: i64,
            modified: i64,
            kind: EntryKind,
        ) -> FieldResult<()> {
            let atime = file_time(accessed);
            let mtime = file_time(modified);
            if kind.is_link() {
                filetime::set_symlink_file_times(path, atime, mtime)?;
            } else {
                filetime::set_file_times(path, atime, mtime)?;
            }
            Ok(())
        }

        fn set_created(&self, path: &Path, created: i64, kind: EntryKind) -> FieldResult<()> {
            let handle = attribute_handle(path, kind)?;
            let creation = filetime_from_nanos(created);
            let result = unsafe { SetFileTime(handle, Some(&creation as *const _), None, None) }
                .map_err(win_err);
            unsafe {
                let _ = CloseHandle(handle);
            }
            result
        }

        fn flags(&self, path: &Path) -> FieldResult<Flags> {
            let attrs = raw_attributes(path)?;
            Ok(Flags {
                archive: Some(attrs & FILE_ATTRIBUTE_ARCHIVE.0 != 0),
                hidden: Some(attrs & FILE_ATTRIBUTE_HIDDEN.0 != 0),
                readonly: Some(attrs & FILE_ATTRIBUTE_READONLY.0 != 0),
                system: Some(attrs & FILE_ATTRIBUTE_SYSTEM.0 != 0),
            })
        }

        fn set_flags(&self, path: &Path, flags: Flags, kind: EntryKind) -> FieldResult<()> {
            if kind.is_link() {
                return Err(FieldError::Unsupported);
            }
            let mut attrs = raw_attributes(path)?;
            for (bit, value) in [
                (FILE_ATTRIBUTE_ARCHIVE.0, flags.archive),
                (FILE_ATTRIBUTE_HIDDEN.0, flags.hidden),
                (FILE_ATTRIBUTE_READONLY.0, flags.readonly),
                (FILE_ATTRIBUTE_SYSTEM.0, flags.system),
            ] {
                match value {
                    Some(true) => attrs |= bit,
                    Some(false) => attrs &= !bit,
                    None => {}
                }
            }
            let wide = wide(path);
            unsafe { SetFileAttributesW(PCWSTR(wide.as_ptr()), FILE_FLAGS_AND_ATTRIBUTES(attrs)) }
                .map_err(win_err)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod imp {
    use super::*;

    impl AttributeAccessor for FsAccessor {
        fn permissions(&self, _path: &Path) -> FieldResult<u32> {
            Err(FieldError::Unsupported)
        }

        fn set_permissions(&self, _path: &Path, _mode: u32, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn owner(&self, _path: &Path) -> FieldResult<Owner> {
            Err(FieldError::Unsupported)
        }

        fn set_owner(&self, _path: &Path, _owner: Owner, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn timestamps(&self, path: &Path) -> FieldResult<Timestamps> {
            let meta = std::fs::symlink_metadata(path)?;
            Ok(Timestamps {
                created: meta.created().ok().map(system_time_nanos),
                modified: meta.modified().ok().map(system_time_nanos),
                accessed: meta.accessed().ok().map(system_time_nanos),
            })
        }

        fn set_file_times(
            &self,
            path: &Path,
            accessed: i64,
            modified: i64,
            kind: EntryKind,
        ) -> FieldResult<()> {
            let atime = file_time(accessed);
            let mtime = file_time(modified);
            if kind.is_link() {
                filetime::set_symlink_file_times(path, atime, mtime)?;
            } else {
                filetime::set_file_times(path, atime, mtime)?;
            }
            Ok(())
        }

        fn set_created(&self, _path: &Path, _created: i64, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }

        fn flags(&self, _path: &Path) -> FieldResult<Flags> {
            Err(FieldError::Unsupported)
        }

        fn set_flags(&self, _path: &Path, _flags: Flags, _kind: EntryKind) -> FieldResult<()> {
            Err(FieldError::Unsupported)
        }
    }
}
