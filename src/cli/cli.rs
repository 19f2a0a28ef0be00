use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

use crate::cli::LogLevel;

/// Stages the edits of a YAML script on a directory and commits them.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// The edit script to apply
    #[clap(default_value = "stagetree.yaml")]
    pub script: PathBuf,

    /// The directory the edits apply to
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Report the changes without writing them
    #[clap(long, short)]
    pub dry_run: bool,

    /// Treat creating an existing file as a conflict
    #[clap(long, short)]
    pub strict: bool,

    /// Worker threads used for writing, defaults to the available parallelism
    #[clap(long, short)]
    pub workers: Option<NonZeroUsize>,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}
