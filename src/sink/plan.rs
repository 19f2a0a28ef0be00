use std::collections::HashMap;

use bytes::Bytes;
use hashlink::{LinkedHashMap, LinkedHashSet};
use tracing::debug;

use super::{ConflictKind, SinkError, SinkEvent};
use crate::host::Host;
use crate::path::TreePath;
use crate::tree::Action;

/// What committing a list of actions does to one output host.
///
/// Built by walking the actions in order while tracking which paths the
/// output host will hold once the earlier actions are applied.
#[derive(Debug, Default)]
pub(super) struct Plan {
    pub(super) conflicts: Vec<(TreePath, ConflictKind)>,
    pub(super) deletes: LinkedHashSet<TreePath>,
    pub(super) renames: Vec<(TreePath, TreePath)>,
    pub(super) creates: LinkedHashMap<TreePath, Bytes>,
    pub(super) updates: LinkedHashMap<TreePath, Bytes>,
}

struct Overlay<'a> {
    host: &'a dyn Host,
    presence: HashMap<TreePath, bool>,
}

impl Overlay<'_> {
    fn exists(&self, path: &TreePath) -> bool {
        match self.presence.get(path) {
            Some(present) => *present,
            None => self.host.is_file(path),
        }
    }

    fn set(&mut self, path: &TreePath, present: bool) {
        self.presence.insert(path.clone(), present);
    }
}

impl Plan {
    /// Plans `actions` against `host`. With `strict`, creating a file the
    /// host already holds is a conflict instead of an update.
    pub(super) fn build(host: &dyn Host, actions: Vec<Action>, strict: bool) -> Plan {
        let mut plan = Plan::default();
        let mut overlay = Overlay {
            host,
            presence: HashMap::new(),
        };

        for action in actions {
            match action {
                Action::Create { path, content } => {
                    if !overlay.exists(&path) {
                        overlay.set(&path, true);
                        plan.creates.insert(path, content);
                    } else if strict {
                        plan.conflicts.push((path, ConflictKind::AlreadyExist));
                    } else {
                        plan.write_existing(path, content);
                    }
                }
                Action::Overwrite { path, content } => {
                    if overlay.exists(&path) {
                        plan.write_existing(path, content);
                    } else {
                        overlay.set(&path, true);
                        plan.creates.insert(path, content);
                    }
                }
                Action::Delete { path } => {
                    if !overlay.exists(&path) {
                        plan.conflicts.push((path, ConflictKind::DoesNotExist));
                        continue;
                    }
                    overlay.set(&path, false);
                    if plan.creates.remove(&path).is_none() {
                        plan.updates.remove(&path);
                        plan.deletes.insert(path);
                    }
                }
                Action::Rename { from, to } => {
                    if !overlay.exists(&from) {
                        plan.conflicts.push((from, ConflictKind::DoesNotExist));
                    } else if overlay.exists(&to) {
                        plan.conflicts.push((to, ConflictKind::AlreadyExist));
                    } else {
                        overlay.set(&from, false);
                        overlay.set(&to, true);
                        plan.renames.push((from, to));
                    }
                }
            }
        }

        debug!(
            "Planned {} deletes, {} renames, {} creates, {} updates with {} conflicts",
            plan.deletes.len(),
            plan.renames.len(),
            plan.creates.len(),
            plan.updates.len(),
            plan.conflicts.len()
        );
        plan
    }

    /// A write onto a path that exists at this point of the plan. A path
    /// created earlier in the plan stays a creation.
    fn write_existing(&mut self, path: TreePath, content: Bytes) {
        if let Some(planned) = self.creates.get_mut(&path) {
            *planned = content;
            return;
        }
        self.updates.insert(path, content);
    }

    pub(super) fn first_conflict(&self) -> Option<SinkError> {
        self.conflicts
            .first()
            .map(|(path, kind)| SinkError::from_conflict(path.clone(), *kind))
    }

    /// Every event of the plan in report order: conflicts, deletes, renames,
    /// creates, updates.
    pub(super) fn events(&self) -> Vec<SinkEvent> {
        let conflicts = self.conflicts.iter().map(|(path, kind)| SinkEvent::Error {
            path: path.clone(),
            description: *kind,
        });
        let deletes = self
            .deletes
            .iter()
            .map(|path| SinkEvent::Delete { path: path.clone() });
        let renames = self.renames.iter().map(|(from, to)| SinkEvent::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        let creates = self.creates.iter().map(|(path, content)| SinkEvent::Create {
            path: path.clone(),
            content: content.clone(),
        });
        let updates = self.updates.iter().map(|(path, content)| SinkEvent::Update {
            path: path.clone(),
            content: content.clone(),
        });

        conflicts
            .chain(deletes)
            .chain(renames)
            .chain(creates)
            .chain(updates)
            .collect()
    }
}
