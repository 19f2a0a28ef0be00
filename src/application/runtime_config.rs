use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub script: PathBuf,
    pub root: PathBuf,
    pub dry_run: bool,
    pub strict: bool,
    pub workers: Option<NonZeroUsize>,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            script: cli.script,
            root: cli.root,
            dry_run: cli.dry_run,
            strict: cli.strict,
            workers: cli.workers,
        }
    }
}
