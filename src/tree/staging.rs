use std::collections::{BTreeSet, HashMap, HashSet};

use bytes::Bytes;
use imbl::OrdMap;
use snafu::{ResultExt, ensure};
use tracing::debug;

use super::{
    Action, FileAlreadyExistSnafu, FileDoesNotExistSnafu, HostSnafu, ParentIsFileSnafu,
    PathIsDirectorySnafu, TreeError,
};
use crate::host::{Host, HostError, walk_files};
use crate::path::TreePath;

/// What a staged path holds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    /// Nothing, although the base host has a file here.
    Removed,
    /// A file. `origin` is the base file it started as, `content` replaces
    /// the origin's content when set.
    File {
        origin: Option<TreePath>,
        content: Option<Bytes>,
    },
}

impl Entry {
    fn base(path: &TreePath) -> Entry {
        Entry::File {
            origin: Some(path.clone()),
            content: None,
        }
    }
}

/// Pending changes of a tree, kept relative to its base host.
///
/// Only paths whose content differs from the base host have an entry, every
/// other path reads through to the base. A base file is the origin of at most
/// one entry. Clones share their storage, so copying a staging is cheap.
#[derive(Debug, Clone, Default)]
pub(super) struct Staging {
    entries: OrdMap<TreePath, Entry>,
}

impl Staging {
    pub(super) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the path carries content staged on this tree.
    pub(super) fn is_modified(&self, path: &TreePath) -> bool {
        matches!(
            self.entries.get(path),
            Some(Entry::File {
                content: Some(_),
                ..
            })
        )
    }

    /// Where the base file `origin` sits now, when it left its own path.
    pub(super) fn moved_to(&self, origin: &TreePath) -> Option<&TreePath> {
        self.entries.iter().find_map(|(path, entry)| match entry {
            Entry::File {
                origin: Some(from), ..
            } if from == origin && path != origin => Some(path),
            _ => None,
        })
    }

    /// True when the base file at `path` is gone without having moved.
    pub(super) fn is_deleted(&self, base: &dyn Host, path: &TreePath) -> bool {
        base.is_file(path) && !self.exists(base, path) && self.moved_to(path).is_none()
    }

    fn entry_of(&self, path: &TreePath) -> Entry {
        self.entries
            .get(path)
            .cloned()
            .unwrap_or_else(|| Entry::base(path))
    }

    /// Whether a file exists at `path`. Directories are not files.
    pub(super) fn exists(&self, base: &dyn Host, path: &TreePath) -> bool {
        match self.entries.get(path) {
            Some(Entry::Removed) => false,
            Some(Entry::File { .. }) => true,
            None => base.is_file(path),
        }
    }

    pub(super) fn is_directory(&self, base: &dyn Host, path: &TreePath) -> Result<bool, TreeError> {
        if path.is_root() {
            return Ok(true);
        }
        let staged = self.entries.iter().any(|(file, entry)| {
            matches!(entry, Entry::File { .. }) && file.child_of(path).is_some()
        });
        if staged {
            return Ok(true);
        }
        Ok(!self.base_files_under(base, path)?.is_empty())
    }

    pub(super) fn ensure_file(&self, base: &dyn Host, path: &TreePath) -> Result<(), TreeError> {
        if self.exists(base, path) {
            return Ok(());
        }
        ensure!(
            !self.is_directory(base, path)?,
            PathIsDirectorySnafu { path: path.clone() }
        );
        FileDoesNotExistSnafu { path: path.clone() }.fail()
    }

    fn ensure_vacant(&self, base: &dyn Host, path: &TreePath) -> Result<(), TreeError> {
        ensure!(
            !self.exists(base, path),
            FileAlreadyExistSnafu { path: path.clone() }
        );
        ensure!(
            !self.is_directory(base, path)?,
            PathIsDirectorySnafu { path: path.clone() }
        );

        let mut current = path.parent();
        while let Some(dir) = current {
            ensure!(
                !self.exists(base, &dir),
                ParentIsFileSnafu {
                    path: path.clone(),
                    parent: dir.clone(),
                }
            );
            current = dir.parent();
        }
        Ok(())
    }

    pub(super) fn read(&self, base: &dyn Host, path: &TreePath) -> Result<Bytes, TreeError> {
        self.ensure_file(base, path)?;
        match self.entry_of(path) {
            Entry::File {
                content: Some(content),
                ..
            } => Ok(content),
            Entry::File {
                origin: Some(origin),
                ..
            } => base.read(&origin).context(HostSnafu),
            _ => FileDoesNotExistSnafu { path: path.clone() }.fail(),
        }
    }

    fn base_files_under(&self, base: &dyn Host, dir: &TreePath) -> Result<Vec<TreePath>, TreeError> {
        if !base.is_directory(dir) {
            return Ok(Vec::new());
        }
        let files = match walk_files(base, dir) {
            Ok(files) => files,
            Err(HostError::NotFound { .. }) => Vec::new(),
            Err(source) => return Err(source).context(HostSnafu),
        };
        Ok(files
            .into_iter()
            .filter(|file| self.exists(base, file))
            .collect())
    }

    /// Every existing file strictly below `dir`, sorted and without duplicates.
    pub(super) fn files_under(
        &self,
        base: &dyn Host,
        dir: &TreePath,
    ) -> Result<BTreeSet<TreePath>, TreeError> {
        let mut files: BTreeSet<TreePath> = self.base_files_under(base, dir)?.into_iter().collect();
        files.extend(
            self.entries
                .iter()
                .filter(|(file, entry)| {
                    matches!(entry, Entry::File { .. }) && file.child_of(dir).is_some()
                })
                .map(|(file, _)| file.clone()),
        );
        Ok(files)
    }

    pub(super) fn create(
        &mut self,
        base: &dyn Host,
        path: &TreePath,
        content: Bytes,
    ) -> Result<(), TreeError> {
        self.ensure_vacant(base, path)?;
        self.place(
            base,
            path,
            Entry::File {
                origin: None,
                content: Some(content),
            },
        );
        Ok(())
    }

    pub(super) fn overwrite(
        &mut self,
        base: &dyn Host,
        path: &TreePath,
        content: Bytes,
    ) -> Result<(), TreeError> {
        self.ensure_file(base, path)?;

        let origin = match self.entry_of(path) {
            Entry::File { origin, .. } => origin,
            Entry::Removed => None,
        };
        self.entries.insert(
            path.clone(),
            Entry::File {
                origin,
                content: Some(content),
            },
        );
        Ok(())
    }

    pub(super) fn delete(&mut self, base: &dyn Host, path: &TreePath) -> Result<(), TreeError> {
        if self.exists(base, path) {
            self.remove_file(base, path);
            return Ok(());
        }
        ensure!(
            self.is_directory(base, path)?,
            FileDoesNotExistSnafu { path: path.clone() }
        );

        let files = self.files_under(base, path)?;
        debug!("Deleting {} files below '{}'", files.len(), path);
        for file in files {
            self.remove_file(base, &file);
        }
        Ok(())
    }

    fn remove_file(&mut self, base: &dyn Host, path: &TreePath) {
        if base.is_file(path) {
            self.entries.insert(path.clone(), Entry::Removed);
        } else {
            self.entries.remove(path);
        }
    }

    /// Puts `entry` at `path`. A file without origin landing on a base file
    /// that never moved becomes an overwrite of that file, and a base file
    /// returning home drops its entry.
    fn place(&mut self, base: &dyn Host, path: &TreePath, entry: Entry) {
        let entry = match entry {
            Entry::File {
                origin: None,
                content,
            } if base.is_file(path) && self.moved_to(path).is_none() => Entry::File {
                origin: Some(path.clone()),
                content,
            },
            entry => entry,
        };
        if entry == Entry::base(path) {
            self.entries.remove(path);
        } else {
            self.entries.insert(path.clone(), entry);
        }
    }

    pub(super) fn rename(
        &mut self,
        base: &dyn Host,
        from: &TreePath,
        to: &TreePath,
    ) -> Result<(), TreeError> {
        self.ensure_file(base, from)?;
        self.ensure_vacant(base, to)?;

        let mut next = self.clone();
        let entry = next.entry_of(from);
        next.remove_file(base, from);
        next.place(base, to, entry);
        next.fold_blocked_renames(base)?;

        *self = next;
        Ok(())
    }

    /// Base renames as origin to target.
    fn renames(&self) -> Vec<(TreePath, TreePath)> {
        self.entries
            .iter()
            .filter_map(|(path, entry)| match entry {
                Entry::File {
                    origin: Some(origin),
                    ..
                } if origin != path => Some((origin.clone(), path.clone())),
                _ => None,
            })
            .collect()
    }

    /// Renames that can never be replayed one after the other, because each
    /// waits on another one to vacate its target, are turned into content
    /// written at their targets.
    fn fold_blocked_renames(&mut self, base: &dyn Host) -> Result<(), TreeError> {
        let (_, blocked) = order_renames(self.renames());
        if blocked.is_empty() {
            return Ok(());
        }
        debug!("Folding {} renames that block each other", blocked.len());

        let mut folded = Vec::with_capacity(blocked.len());
        for (origin, target) in blocked {
            let content = match self.entries.get(&target) {
                Some(Entry::File {
                    content: Some(content),
                    ..
                }) => content.clone(),
                _ => base.read(&origin).context(HostSnafu)?,
            };
            folded.push((target, content));
        }

        for (target, _) in &folded {
            self.entries.remove(target);
        }
        for (target, content) in folded {
            self.place(
                base,
                &target,
                Entry::File {
                    origin: None,
                    content: Some(content),
                },
            );
        }
        Ok(())
    }

    /// Staged changes in replay order: deletes, renames, creates, overwrites.
    pub(super) fn actions(&self, base: &dyn Host) -> Vec<Action> {
        let renames = self.renames();
        let moved: HashSet<&TreePath> = renames.iter().map(|(origin, _)| origin).collect();

        let mut deletes = Vec::new();
        let mut creates = Vec::new();
        let mut overwrites = Vec::new();
        for (path, entry) in self.entries.iter() {
            let base_in_place = base.is_file(path) && !moved.contains(path);
            match entry {
                Entry::Removed => {
                    if base_in_place {
                        deletes.push(Action::Delete { path: path.clone() });
                    }
                }
                Entry::File { origin, content } => {
                    if base_in_place && origin.as_ref() != Some(path) {
                        deletes.push(Action::Delete { path: path.clone() });
                    }
                    let Some(content) = content else {
                        continue;
                    };
                    if origin.is_some() {
                        overwrites.push(Action::Overwrite {
                            path: path.clone(),
                            content: content.clone(),
                        });
                    } else {
                        creates.push(Action::Create {
                            path: path.clone(),
                            content: content.clone(),
                        });
                    }
                }
            }
        }

        let (ordered, _) = order_renames(renames);
        let mut actions = deletes;
        actions.extend(
            ordered
                .into_iter()
                .map(|(from, to)| Action::Rename { from, to }),
        );
        actions.extend(creates);
        actions.extend(overwrites);
        actions
    }
}

/// Whether the rename out of `source` has to run before a rename into `target`:
/// either it vacates `target` itself, a directory at `target`, or a file
/// standing where a parent directory of `target` goes.
fn vacates(source: &TreePath, target: &TreePath) -> bool {
    source.starts_with(target) || target.starts_with(source)
}

/// Orders renames so that each one runs once the renames it waits on are
/// done. Renames caught in a loop of waits, and those waiting on them, are
/// returned apart.
fn order_renames(
    renames: Vec<(TreePath, TreePath)>,
) -> (Vec<(TreePath, TreePath)>, Vec<(TreePath, TreePath)>) {
    let count = renames.len();
    let mut waits_on: Vec<usize> = vec![0; count];
    let mut unblocks: HashMap<usize, Vec<usize>> = HashMap::new();
    for (later, (_, target)) in renames.iter().enumerate() {
        for (earlier, (source, _)) in renames.iter().enumerate() {
            if earlier != later && vacates(source, target) {
                waits_on[later] += 1;
                unblocks.entry(earlier).or_default().push(later);
            }
        }
    }

    let mut ready: Vec<usize> = (0..count).filter(|index| waits_on[*index] == 0).collect();
    ready.reverse();
    let mut order = Vec::with_capacity(count);
    while let Some(index) = ready.pop() {
        order.push(index);
        for next in unblocks.remove(&index).unwrap_or_default() {
            waits_on[next] -= 1;
            if waits_on[next] == 0 {
                ready.push(next);
            }
        }
    }

    let mut slots: Vec<Option<(TreePath, TreePath)>> = renames.into_iter().map(Some).collect();
    let ordered = order
        .iter()
        .filter_map(|index| slots[*index].take())
        .collect();
    let blocked = slots.into_iter().flatten().collect();
    (ordered, blocked)
}
