//! Committing a staged tree to an output host.
//!
//! A sink plans the tree's actions against the current state of its output
//! host, reports one event per file through its [`Reporter`] and, unless it
//! only performs a dry run, applies them.

mod dry_run;
mod event;
mod host_sink;
mod plan;

use std::num::NonZeroUsize;

use snafu::Snafu;
use tracing::warn;

use crate::host::HostError;
use crate::path::TreePath;
use crate::tree::HostTree;

pub use dry_run::DryRunSink;
pub use event::{ConflictKind, EventKind, ReportItem, Reporter, SinkEvent};
pub use host_sink::HostSink;

pub trait Sink {
    /// The event stream of this sink. Only the first call returns it.
    fn reporter(&mut self) -> Option<Reporter>;
    /// Consumes the tree and commits its actions. A sink commits once.
    async fn commit(&mut self, tree: HostTree) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    /// Report creating an existing file as a conflict instead of an update.
    pub strict: bool,
    /// Worker threads used by [`HostSink`]. Defaults to the available parallelism.
    pub workers: Option<NonZeroUsize>,
}

fn warn_open_updates(tree: &HostTree) {
    if tree.has_open_updates() {
        warn!(
            "Committing tree {} with open update recorders, their edits are lost",
            tree.id()
        );
    }
}

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SinkError {
    #[snafu(display("Path '{}' already exists on the output host", path))]
    FileAlreadyExist { path: TreePath },
    #[snafu(display("Path '{}' does not exist on the output host", path))]
    FileDoesNotExist { path: TreePath },
    #[snafu(display("Failed to apply changes to the output host"))]
    Host { source: HostError },
    #[snafu(display("Failed to dispatch work on '{}': {}", path, message))]
    Dispatch { path: TreePath, message: String },
    #[snafu(display("Work on '{}' got cancelled", path))]
    Canceled {
        path: TreePath,
        source: futures_channel::oneshot::Canceled,
    },
    #[snafu(display("The sink has already committed a tree"))]
    AlreadyCommitted,
}

impl SinkError {
    pub(crate) fn from_conflict(path: TreePath, kind: ConflictKind) -> Self {
        match kind {
            ConflictKind::AlreadyExist => SinkError::FileAlreadyExist { path },
            ConflictKind::DoesNotExist => SinkError::FileDoesNotExist { path },
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SinkCreationError {
    #[snafu(display("Failed to create the sink dispatcher"))]
    Dispatcher { source: std::io::Error },
}
