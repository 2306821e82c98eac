/*!
 * Gitignore-style exclusion rules
 *
 * Rules are compiled into an ordered set evaluated with git semantics: the
 * last matching rule decides, a `!` prefix re-includes, a trailing `/`
 * restricts the rule to directories and a leading or interior `/` anchors it
 * to the scan root. Once a directory matches an exclusion, everything below
 * it stays excluded no matter what later rules say.
 */

use std::io;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

/// Error produced when an exclusion rule cannot be compiled into a matcher.
#[derive(Error, Debug)]
#[error("failed to compile exclusion rule '{pattern}': {source}")]
pub struct PatternError {
    pattern: String,
    source: globset::Error,
}

impl PatternError {
    /// The offending rule as supplied by the user.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A single compiled exclusion rule.
#[derive(Debug, Clone)]
pub struct Rule {
    raw: String,
    negated: bool,
    dir_only: bool,
    anchored: bool,
    matcher: GlobMatcher,
}

impl Rule {
    /// Parses one rule line. Returns `None` for blank lines, comments and
    /// patterns that reduce to nothing.
    fn parse(line: &str, case_insensitive: bool) -> Result<Option<Self>, PatternError> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let raw = line.to_string();
        let mut body = line;

        let negated = body.starts_with('!');
        if negated {
            body = &body[1..];
        }

        let dir_only = body.ends_with('/');
        if dir_only {
            body = &body[..body.len() - 1];
        }

        let anchored = body.starts_with('/') || body.contains('/');
        if let Some(stripped) = body.strip_prefix('/') {
            body = stripped;
        }

        if body.is_empty() {
            return Ok(None);
        }

        // Unanchored rules match whole basename segments at any depth.
        let glob = if anchored {
            body.to_string()
        } else {
            format!("**/{body}")
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(true)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| PatternError {
                pattern: raw.clone(),
                source,
            })?
            .compile_matcher();

        Ok(Some(Self {
            raw,
            negated,
            dir_only,
            anchored,
            matcher,
        }))
    }

    /// Whether this rule matches the given relative path.
    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.matcher.is_match(path)
    }

    /// The rule text as supplied by the user.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the rule re-includes instead of excluding.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether the rule only applies to directories.
    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// Whether the rule is anchored to the scan root.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }
}

/// An ordered, compiled set of exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles rule lines in the order supplied. Compilation is
    /// all-or-nothing: the first malformed rule fails the whole set.
    pub fn compile<I, S>(lines: I, case_insensitive: bool) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for line in lines {
            if let Some(rule) = Rule::parse(line.as_ref(), case_insensitive)? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// A set with no rules; excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether `path` (relative to the scan root) is excluded.
    ///
    /// The decision for the path itself follows last-match-wins precedence.
    /// Before that, every ancestor directory is checked: an excluded ancestor
    /// is final and cannot be overridden by a negation deeper down, matching
    /// git's traversal short-circuit.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        if let Some(parent) = path.parent() {
            let mut prefix = PathBuf::new();
            for component in parent.components() {
                prefix.push(component);
                if self.last_match(&prefix, true) == Some(true) {
                    return true;
                }
            }
        }

        self.last_match(path, is_dir).unwrap_or(false)
    }

    /// The verdict of the last rule matching `path`, if any. `Some(true)`
    /// means excluded, `Some(false)` means re-included by a negation.
    fn last_match(&self, path: &Path, is_dir: bool) -> Option<bool> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(path, is_dir))
            .map(|rule| !rule.negated)
    }
}

/// Reads rule lines from an ignore file. Invalid UTF-8 is replaced rather
/// than rejected, matching how git reads ignore files it did not write.
pub fn read_rule_file(path: &Path) -> io::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}
