/*!
 * Save and restore run loops
 *
 * One run is a strict single-threaded sequence: validate the root, compile
 * the exclusion rules, then process one entry at a time. Per-entry problems
 * are collected and reported; only root, pattern, snapshot-file and
 * interrupt conditions abort a run.
 */

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::attrs::{self, ApplyOutcome, Field, SkipReason};
use crate::config::{RestoreConfig, SaveConfig};
use crate::error::{AttrSnapError, Result};
use crate::interrupt;
use crate::pattern::{read_rule_file, RuleSet};
use crate::platform::FsAccessor;
use crate::report::{Reporter, RunSummary};
use crate::snapshot::Snapshot;
use crate::types::{AttrRecord, EntryKind, WalkEntry};
use crate::walker::{WalkOptions, Walker};

/// A save run is abandoned after this many errors back to back.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Compiles ignore-file rules followed by command-line exclusions into one
/// ordered rule set.
fn compile_rules(
    excludes: &[String],
    ignore_files: &[PathBuf],
    ignore_case: bool,
) -> Result<RuleSet> {
    let mut lines = Vec::new();
    for file in ignore_files {
        let file_lines = read_rule_file(file).map_err(|err| {
            AttrSnapError::File(format!(
                "cannot read ignore file \"{}\": {err}",
                file.display()
            ))
        })?;
        lines.extend(file_lines);
    }
    lines.extend(excludes.iter().cloned());
    Ok(RuleSet::compile(lines, ignore_case)?)
}

fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {pos} entries {wide_msg:.dim}")
            .unwrap(),
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress
}

fn short_name(path: &Path) -> String {
    let name = path.display().to_string();
    if name.len() > 48 {
        format!("...{}", &name[name.len().saturating_sub(45)..])
    } else {
        name
    }
}

/// Captures the attributes of every entry under the working path into the
/// output snapshot.
pub fn run_save(config: &SaveConfig) -> Result<RunSummary> {
    config.validate()?;
    let rules = compile_rules(&config.exclude, &config.ignore_files, config.ignore_case)?;

    let root = fs::canonicalize(&config.working_path)
        .map_err(|_| AttrSnapError::Root(config.working_path.clone()))?;

    if let Some(parent) = config.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|err| {
                AttrSnapError::File(format!(
                    "cannot create output directory \"{}\": {err}",
                    parent.display()
                ))
            })?;
        }
    }

    let accessor = FsAccessor::new();
    let mut snapshot = Snapshot::new(root.to_string_lossy().into_owned(), config.relative);
    let mut summary = RunSummary::default();
    let start = Instant::now();

    let progress = spinner();
    progress.set_message(format!("Collecting attributes in {}", root.display()));

    let excluded = Cell::new(0usize);
    let walker = Walker::new(
        &root,
        rules,
        WalkOptions {
            skip_links: config.skip_links,
        },
    );

    let on_excluded = |rel: &Path, _is_dir: bool| {
        excluded.set(excluded.get() + 1);
        if config.print_excluded {
            let shown = if config.relative {
                rel.to_path_buf()
            } else {
                root.join(rel)
            };
            progress.println(format!("Skipping excluded path \"{}\"", shown.display()));
        }
    };

    let mut consecutive = 0usize;
    for item in walker.walk(on_excluded) {
        if interrupt::interrupted() {
            progress.finish_and_clear();
            println!("\nShutdown requested... dumping what could be collected...");
            let _ = snapshot.save(&config.output);
            return Err(AttrSnapError::Interrupted);
        }
        if consecutive >= MAX_CONSECUTIVE_ERRORS {
            progress.finish_and_clear();
            if !snapshot.is_empty() {
                let _ = snapshot.save(&config.output);
            }
            return Err(AttrSnapError::TooManyErrors(consecutive));
        }

        match item {
            Ok(entry) => {
                progress.inc(1);
                progress.set_message(short_name(&entry.rel_path));

                let stored = stored_path(&entry, config.relative);
                match attrs::capture(&entry, stored, &accessor) {
                    Ok(record) => {
                        consecutive = 0;
                        snapshot.push(record);
                        summary.captured += 1;
                    }
                    Err(err) => {
                        eprintln!("{err}");
                        summary.record_error(err.path.display().to_string());
                        consecutive += 1;
                    }
                }
            }
            Err(err) => {
                eprintln!("{err}");
                summary.record_error(err.path.display().to_string());
                consecutive += 1;
            }
        }
    }
    progress.finish_and_clear();
    summary.excluded = excluded.get();

    snapshot.save(&config.output)?;
    println!("\nAttributes saved to \"{}\"", config.output.display());

    let reporter = Reporter::new();
    reporter.print_save_report(&summary, &config.output.display().to_string(), start.elapsed());
    reporter.print_errors(&summary);

    Ok(summary)
}

fn stored_path(entry: &WalkEntry, relative: bool) -> String {
    if relative {
        entry.rel_path.to_string_lossy().into_owned()
    } else {
        entry.path.to_string_lossy().into_owned()
    }
}

/// Applies a previously saved snapshot onto the tree under the working path.
pub fn run_restore(config: &RestoreConfig) -> Result<RunSummary> {
    config.validate()?;
    let rules = compile_rules(&config.exclude, &config.ignore_files, config.ignore_case)?;
    let snapshot = Snapshot::load(&config.input)?;

    let work_root = fs::canonicalize(&config.working_path)
        .map_err(|_| AttrSnapError::Root(config.working_path.clone()))?;

    let accessor = FsAccessor::new();
    let mut summary = RunSummary::default();
    let start = Instant::now();

    let mut records: Vec<&AttrRecord> = snapshot.records.iter().collect();
    records.sort_by(|a, b| a.path.cmp(&b.path));

    for record in records {
        if interrupt::interrupted() {
            return Err(AttrSnapError::Interrupted);
        }

        let target: PathBuf = if snapshot.is_relative {
            config.working_path.join(&record.path)
        } else {
            PathBuf::from(&record.path)
        };

        // Restore-time exclusions filter which targets are touched; the
        // snapshot itself is left as it is.
        if !rules.is_empty() {
            let rel = if snapshot.is_relative {
                PathBuf::from(&record.path)
            } else {
                Path::new(&record.path)
                    .strip_prefix(&work_root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(&record.path))
            };
            if rules.is_excluded(&rel, record.kind == EntryKind::Directory) {
                summary.excluded += 1;
                if config.print_excluded {
                    println!("Skipping excluded path \"{}\"", target.display());
                }
                continue;
            }
        }

        match attrs::apply(record, &target, &accessor, &config.options) {
            ApplyOutcome::Applied { changes, failures } => {
                if changes.is_empty() {
                    summary.unchanged += 1;
                } else {
                    summary.applied += 1;
                    if config.print_modified {
                        println!(
                            "Updating {} for \"{}\"",
                            join_fields(&changes),
                            target.display()
                        );
                    }
                }
                if !failures.is_empty() {
                    for failure in &failures {
                        eprintln!(
                            "Failed to set {} for \"{}\": {}",
                            failure.field,
                            target.display(),
                            failure.message
                        );
                    }
                    summary.record_error(target.display().to_string());
                }
            }
            ApplyOutcome::Skipped(reason) => {
                summary.skipped += 1;
                if config.print_skipped {
                    match reason {
                        SkipReason::Missing => {
                            println!("Skipping non-existent item \"{}\"", target.display());
                        }
                        SkipReason::UnsupportedLink => {
                            println!("Skipping symbolic link \"{}\"", target.display());
                        }
                        SkipReason::KindMismatch { expected, found } => {
                            println!(
                                "Skipping \"{}\": saved as {expected}, now a {found}",
                                target.display()
                            );
                        }
                    }
                }
            }
            ApplyOutcome::Failed(err) => {
                eprintln!("{err}");
                summary.record_error(err.path.display().to_string());
            }
        }
    }

    let reporter = Reporter::new();
    if summary.error_count() > 0 {
        reporter.print_errors(&summary);
        reporter.print_restore_report(&summary, &config.input.display().to_string(), start.elapsed());
        return Err(AttrSnapError::PartialFailure(summary.error_count()));
    }

    if summary.applied == 0 {
        println!("Nothing to change.");
    }
    reporter.print_restore_report(&summary, &config.input.display().to_string(), start.elapsed());

    Ok(summary)
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" & ")
}
