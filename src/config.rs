/*!
 * Configuration handling for attrsnap
 */

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::attrs::RestoreOptions;
use crate::error::{AttrSnapError, Result};
use crate::snapshot::DEFAULT_SNAPSHOT_NAME;

/// Command-line arguments for attrsnap
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "attrsnap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Save and restore file attributes in a directory tree",
    long_about = "Captures permissions, ownership, timestamps and platform attribute flags \
                  for every entry under a directory into a snapshot file, and applies a \
                  previously captured snapshot back onto a tree.\n\n\
                  Exit codes:\n  \
                  0: success\n  \
                  1: user interrupted\n  \
                  2: generic error\n  \
                  3: file related error\n  \
                  10: snapshot file related error"
)]
pub struct Args {
    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

/// Mode of operation
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Save file and directory attributes in a directory tree
    Save(SaveArgs),
    /// Restore file and directory attributes in a directory tree
    Restore(RestoreArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct SaveArgs {
    /// Snapshot file to write
    #[clap(short = 'o', long, default_value = DEFAULT_SNAPSHOT_NAME)]
    pub output: PathBuf,

    /// Path to capture attributes from
    #[clap(short = 'w', long, default_value = ".")]
    pub working_path: PathBuf,

    /// Pattern rules to exclude, same format as git ignore rules
    #[clap(short = 'e', long = "exclude")]
    pub exclude: Vec<String>,

    /// File containing pattern rules, same format as git ignore rules
    #[clap(long = "ignore-file")]
    pub ignore_file: Vec<PathBuf>,

    /// Ignore casing in exclusion rules
    #[clap(long)]
    pub ignore_case: bool,

    /// Store the paths relative to the working path instead of absolute
    #[clap(short = 'r', long)]
    pub relative: bool,

    /// Leave symlinks and junctions out of the snapshot
    #[clap(long)]
    pub skip_links: bool,

    /// Don't print excluded files and folders
    #[clap(long)]
    pub no_print_excluded: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Snapshot file to read
    #[clap(short = 'i', long, default_value = DEFAULT_SNAPSHOT_NAME)]
    pub input: PathBuf,

    /// Path the attributes will be applied under
    #[clap(short = 'w', long, default_value = ".")]
    pub working_path: PathBuf,

    /// Pattern rules to exclude, same format as git ignore rules
    #[clap(short = 'e', long = "exclude")]
    pub exclude: Vec<String>,

    /// File containing pattern rules, same format as git ignore rules
    #[clap(long = "ignore-file")]
    pub ignore_file: Vec<PathBuf>,

    /// Ignore casing in exclusion rules
    #[clap(long)]
    pub ignore_case: bool,

    /// Don't print modified files and folders
    #[clap(long)]
    pub no_print_modified: bool,

    /// Don't print skipped files and folders
    #[clap(long)]
    pub no_print_skipped: bool,

    /// Don't print excluded files and folders
    #[clap(long)]
    pub no_print_excluded: bool,

    /// Restore the creation dates into the accessed dates
    #[clap(long)]
    pub copy_to_access: bool,

    /// Skip restoring permissions
    #[clap(long)]
    pub skip_permissions: bool,

    /// Skip restoring ownership
    #[clap(long)]
    pub skip_owner: bool,

    /// Skip restoring creation times
    #[clap(long)]
    pub skip_created: bool,

    /// Skip restoring modification times
    #[clap(long)]
    pub skip_modified: bool,

    /// Skip restoring access times
    #[clap(long)]
    pub skip_accessed: bool,

    /// Skip setting the "archive" attribute
    #[clap(long)]
    pub skip_archive: bool,

    /// Skip setting the "hidden" attribute
    #[clap(long)]
    pub skip_hidden: bool,

    /// Skip setting the "read-only" attribute
    #[clap(long)]
    pub skip_readonly: bool,

    /// Skip setting the "system" attribute
    #[clap(long)]
    pub skip_system: bool,
}

/// Validated configuration for a save run
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub output: PathBuf,
    pub working_path: PathBuf,
    pub exclude: Vec<String>,
    pub ignore_files: Vec<PathBuf>,
    pub ignore_case: bool,
    pub relative: bool,
    pub skip_links: bool,
    pub print_excluded: bool,
}

impl SaveConfig {
    /// Create configuration from command-line arguments
    pub fn from_args(args: SaveArgs) -> Self {
        Self {
            output: args.output,
            working_path: args.working_path,
            exclude: args.exclude,
            ignore_files: args.ignore_file,
            ignore_case: args.ignore_case,
            relative: args.relative,
            skip_links: args.skip_links,
            print_excluded: !args.no_print_excluded,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.working_path.is_dir() {
            return Err(AttrSnapError::Root(self.working_path.clone()));
        }

        validate_ignore_files(&self.ignore_files)?;

        if self.output.is_dir() {
            return Err(AttrSnapError::File(format!(
                "the output path \"{}\" is a directory",
                self.output.display()
            )));
        }
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() && parent.is_file() {
                return Err(AttrSnapError::File(format!(
                    "the output directory \"{}\" is an existing file",
                    parent.display()
                )));
            }
        }

        Ok(())
    }
}

/// Validated configuration for a restore run
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub input: PathBuf,
    pub working_path: PathBuf,
    pub exclude: Vec<String>,
    pub ignore_files: Vec<PathBuf>,
    pub ignore_case: bool,
    pub print_modified: bool,
    pub print_skipped: bool,
    pub print_excluded: bool,
    pub options: RestoreOptions,
}

impl RestoreConfig {
    /// Create configuration from command-line arguments
    pub fn from_args(args: RestoreArgs) -> Self {
        let options = RestoreOptions::new()
            .skip_permissions(args.skip_permissions)
            .skip_owner(args.skip_owner)
            .skip_created(args.skip_created)
            .skip_modified(args.skip_modified)
            .skip_accessed(args.skip_accessed)
            .skip_archive(args.skip_archive)
            .skip_hidden(args.skip_hidden)
            .skip_readonly(args.skip_readonly)
            .skip_system(args.skip_system)
            .copy_to_access(args.copy_to_access);

        Self {
            input: args.input,
            working_path: args.working_path,
            exclude: args.exclude,
            ignore_files: args.ignore_file,
            ignore_case: args.ignore_case,
            print_modified: !args.no_print_modified,
            print_skipped: !args.no_print_skipped,
            print_excluded: !args.no_print_excluded,
            options,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.working_path.is_dir() {
            return Err(AttrSnapError::Root(self.working_path.clone()));
        }
        validate_ignore_files(&self.ignore_files)
    }
}

fn validate_ignore_files(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if !path.is_file() {
            return Err(AttrSnapError::File(format!(
                "ignore file \"{}\" is not a file or doesn't exist",
                path.display()
            )));
        }
    }
    Ok(())
}
