//! Virtual file tree: an in-memory overlay of staged file changes on top of a
//! read-only base host.
//!
//! A [`HostTree`] never touches its base host for writing. Creations,
//! overwrites, deletions and renames are recorded in a staging area and
//! folded together as they arrive, so that [`HostTree::actions`] always
//! describes the shortest way of turning the base host into the tree's
//! current state.

mod action;
mod entry;
mod host_tree;
mod merge;
mod staging;

use snafu::Snafu;

use crate::host::HostError;
use crate::path::{PathError, TreePath};
use crate::recorder::RecorderError;

pub use action::{Action, ActionKind};
pub use entry::{DirEntry, FileEntry};
pub use host_tree::HostTree;
pub use merge::MergeStrategy;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TreeError {
    #[snafu(display("Path '{}' already exists", path))]
    FileAlreadyExist { path: TreePath },
    #[snafu(display("Path '{}' does not exist", path))]
    FileDoesNotExist { path: TreePath },
    #[snafu(display("Path '{}' is a directory", path))]
    PathIsDirectory { path: TreePath },
    #[snafu(display("Cannot place '{}' below the file '{}'", path, parent))]
    ParentIsFile { path: TreePath, parent: TreePath },
    #[snafu(display("Content of '{}' changed while an update was recorded", path))]
    ContentHasMutated { path: TreePath },
    #[snafu(display("An update is already open for '{}'", path))]
    UpdateAlreadyOpen { path: TreePath },
    #[snafu(display("The update recorder for '{}' is not open on this tree", path))]
    InvalidUpdateRecord { path: TreePath },
    #[snafu(display("Merge conflict on '{}'", path))]
    MergeConflict { path: TreePath },
    #[snafu(display("Content of '{}' is not valid UTF-8", path))]
    InvalidText {
        path: TreePath,
        source: std::str::Utf8Error,
    },
    #[snafu(display("Invalid path"))]
    Path { source: PathError },
    #[snafu(display("Invalid update"))]
    Recorder { source: RecorderError },
    #[snafu(display("Failed to access the base host"))]
    Host { source: HostError },
}
