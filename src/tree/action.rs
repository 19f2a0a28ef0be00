use bytes::Bytes;
use derive_more::Display;

use crate::path::TreePath;

/// A single staged change, the unit a sink turns into filesystem effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { path: TreePath, content: Bytes },
    Overwrite { path: TreePath, content: Bytes },
    Rename { from: TreePath, to: TreePath },
    Delete { path: TreePath },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ActionKind {
    #[display("create")]
    Create,
    #[display("overwrite")]
    Overwrite,
    #[display("rename")]
    Rename,
    #[display("delete")]
    Delete,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Overwrite { .. } => ActionKind::Overwrite,
            Action::Rename { .. } => ActionKind::Rename,
            Action::Delete { .. } => ActionKind::Delete,
        }
    }

    /// The path the action starts from; the source for a rename.
    pub fn path(&self) -> &TreePath {
        match self {
            Action::Create { path, .. }
            | Action::Overwrite { path, .. }
            | Action::Delete { path } => path,
            Action::Rename { from, .. } => from,
        }
    }
}
