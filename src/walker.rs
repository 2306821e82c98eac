/*!
 * Selective directory tree traversal
 *
 * Walks a root depth-first in pre-order, pruning excluded directories before
 * they are ever opened and skipping excluded files before they are yielded.
 * Entry order inside a directory is sorted by file name, so repeated runs on
 * an unchanged tree produce the same sequence.
 */

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::EntryError;
use crate::pattern::RuleSet;
use crate::types::{EntryKind, WalkEntry};

/// Options controlling the traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Omit symlinks and junctions instead of yielding them as terminal
    /// entries. Links are never followed either way.
    pub skip_links: bool,
}

/// Walks a directory tree, yielding the entries that survive the exclusion
/// rules. The root itself is not yielded.
pub struct Walker {
    root: PathBuf,
    rules: RuleSet,
    options: WalkOptions,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, rules: RuleSet, options: WalkOptions) -> Self {
        Self {
            root: root.into(),
            rules,
            options,
        }
    }

    /// Starts the traversal. `on_excluded` is invoked once for every pruned
    /// directory or skipped file, with the path relative to the root.
    pub fn walk<F>(&self, on_excluded: F) -> Walk<'_, F>
    where
        F: FnMut(&Path, bool),
    {
        Walk {
            inner: WalkDir::new(&self.root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            root: &self.root,
            rules: &self.rules,
            options: self.options,
            on_excluded,
        }
    }
}

/// Lazy iterator over the surviving entries of one traversal.
pub struct Walk<'a, F> {
    inner: walkdir::IntoIter,
    root: &'a Path,
    rules: &'a RuleSet,
    options: WalkOptions,
    on_excluded: F,
}

impl<F> Iterator for Walk<'_, F>
where
    F: FnMut(&Path, bool),
{
    type Item = Result<WalkEntry, EntryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(EntryError::from(err))),
            };

            // The root is traversed but not reported.
            if entry.depth() == 0 {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(self.root)
                .unwrap_or_else(|_| entry.path())
                .to_path_buf();
            let file_type = entry.file_type();
            let kind = EntryKind::of(&file_type);

            if self.rules.is_excluded(&rel_path, file_type.is_dir()) {
                (self.on_excluded)(&rel_path, file_type.is_dir());
                if file_type.is_dir() {
                    // Hard prune: the directory is never opened.
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if kind.is_link() && self.options.skip_links {
                continue;
            }

            return Some(Ok(WalkEntry {
                path: entry.into_path(),
                rel_path,
                kind,
            }));
        }
    }
}
