use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use imbl::{HashSet, OrdSet};
use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use super::entry::{DirEntry, FileEntry};
use super::staging::Staging;
use super::{
    Action, ContentHasMutatedSnafu, HostSnafu, InvalidTextSnafu, InvalidUpdateRecordSnafu,
    PathSnafu, TreeError, UpdateAlreadyOpenSnafu,
};
use crate::host::{Host, MemoryHost, walk_files};
use crate::path::TreePath;
use crate::recorder::{UpdateRecorder, fingerprint};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

fn next_tree_id() -> u64 {
    NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)
}

pub(super) fn resolve(path: impl AsRef<str>) -> Result<TreePath, TreeError> {
    TreePath::parse(path).context(PathSnafu)
}

/// A virtual file tree staged on top of a read-only base host.
#[derive(Debug)]
pub struct HostTree {
    pub(super) id: u64,
    pub(super) ancestry: HashSet<u64>,
    pub(super) base: Arc<dyn Host>,
    pub(super) staging: Staging,
    open_updates: OrdSet<TreePath>,
}

impl HostTree {
    pub fn new(base: Arc<dyn Host>) -> Self {
        Self {
            id: next_tree_id(),
            ancestry: HashSet::new(),
            base,
            staging: Staging::default(),
            open_updates: OrdSet::new(),
        }
    }

    /// A tree over an empty base in which every file of `host` is staged as
    /// a creation.
    pub fn host_create(host: &dyn Host) -> Result<Self, TreeError> {
        let mut tree = Self::new(Arc::new(MemoryHost::new()));
        let files = walk_files(host, &TreePath::root()).context(HostSnafu)?;
        debug!("Staging {} files as creations", files.len());

        for path in files {
            let content = host.read(&path).context(HostSnafu)?;
            tree.staging.create(tree.base.as_ref(), &path, content)?;
        }
        Ok(tree)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn base(&self) -> &Arc<dyn Host> {
        &self.base
    }

    /// Whether a file exists at `path`. Invalid paths never exist.
    pub fn exists(&self, path: impl AsRef<str>) -> bool {
        resolve(path).is_ok_and(|path| self.staging.exists(self.base.as_ref(), &path))
    }

    pub fn is_directory(&self, path: impl AsRef<str>) -> bool {
        let Ok(path) = resolve(path) else {
            return false;
        };
        match self.staging.is_directory(self.base.as_ref(), &path) {
            Ok(is_directory) => is_directory,
            Err(error) => {
                warn!("Failed to inspect directory '{}': {}", path, error);
                false
            }
        }
    }

    pub fn read(&self, path: impl AsRef<str>) -> Result<Bytes, TreeError> {
        let path = resolve(path)?;
        self.staging.read(self.base.as_ref(), &path)
    }

    pub fn read_text(&self, path: impl AsRef<str>) -> Result<String, TreeError> {
        let path = resolve(path)?;
        let content = self.staging.read(self.base.as_ref(), &path)?;
        let text = std::str::from_utf8(&content).context(InvalidTextSnafu { path })?;
        Ok(text.to_owned())
    }

    pub fn get(&self, path: impl AsRef<str>) -> Option<FileEntry> {
        let path = resolve(path).ok()?;
        let content = self.staging.read(self.base.as_ref(), &path).ok()?;
        Some(FileEntry { path, content })
    }

    /// Every existing file, sorted.
    pub fn files(&self) -> Result<Vec<TreePath>, TreeError> {
        self.files_under(&TreePath::root())
    }

    pub(super) fn files_under(&self, dir: &TreePath) -> Result<Vec<TreePath>, TreeError> {
        Ok(self
            .staging
            .files_under(self.base.as_ref(), dir)?
            .into_iter()
            .collect())
    }

    /// Calls `visitor` once for every existing file, in sorted order.
    pub fn visit(&self, mut visitor: impl FnMut(&TreePath)) -> Result<(), TreeError> {
        for path in self.files()? {
            visitor(&path);
        }
        Ok(())
    }

    pub fn get_dir(&self, path: impl AsRef<str>) -> Result<DirEntry<'_>, TreeError> {
        Ok(DirEntry::new(self, resolve(path)?))
    }

    /// Staged changes in replay order: deletes, renames, creates, overwrites.
    pub fn actions(&self) -> Vec<Action> {
        self.staging.actions(self.base.as_ref())
    }

    pub fn has_open_updates(&self) -> bool {
        !self.open_updates.is_empty()
    }

    pub fn create(&mut self, path: impl AsRef<str>, content: impl Into<Bytes>) -> Result<(), TreeError> {
        let path = resolve(path)?;
        self.staging.create(self.base.as_ref(), &path, content.into())
    }

    pub fn overwrite(
        &mut self,
        path: impl AsRef<str>,
        content: impl Into<Bytes>,
    ) -> Result<(), TreeError> {
        let path = resolve(path)?;
        self.staging.overwrite(self.base.as_ref(), &path, content.into())
    }

    /// Deletes a file, or every file below a directory.
    pub fn delete(&mut self, path: impl AsRef<str>) -> Result<(), TreeError> {
        let path = resolve(path)?;
        self.staging.delete(self.base.as_ref(), &path)
    }

    pub fn rename(&mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> Result<(), TreeError> {
        let from = resolve(from)?;
        let to = resolve(to)?;
        self.staging.rename(self.base.as_ref(), &from, &to)
    }

    /// Opens a recorder on the current content of `path`.
    pub fn begin_update(&mut self, path: impl AsRef<str>) -> Result<UpdateRecorder, TreeError> {
        let path = resolve(path)?;
        let content = self.staging.read(self.base.as_ref(), &path)?;
        ensure!(
            !self.open_updates.contains(&path),
            UpdateAlreadyOpenSnafu { path }
        );

        self.open_updates.insert(path.clone());
        Ok(UpdateRecorder::new(self.id, path, content))
    }

    /// Closes the recorder and stages its edits as an overwrite.
    pub fn commit_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
        let path = recorder.path().clone();
        self.close_update(&recorder)?;

        let current = self.staging.read(self.base.as_ref(), &path)?;
        let unchanged =
            fingerprint(&current) == recorder.fingerprint() && current == *recorder.original();
        ensure!(unchanged, ContentHasMutatedSnafu { path });

        if recorder.is_empty() {
            debug!("Update of '{}' recorded no edits", path);
            return Ok(());
        }
        self.staging
            .overwrite(self.base.as_ref(), &path, recorder.apply())
    }

    /// Closes the recorder without touching the file.
    pub fn discard_update(&mut self, recorder: UpdateRecorder) -> Result<(), TreeError> {
        self.close_update(&recorder)
    }

    fn close_update(&mut self, recorder: &UpdateRecorder) -> Result<(), TreeError> {
        ensure!(
            recorder.owner() == self.id && self.open_updates.remove(recorder.path()).is_some(),
            InvalidUpdateRecordSnafu {
                path: recorder.path().clone(),
            }
        );
        Ok(())
    }

    /// A new tree sharing the base host and, until either side changes, the
    /// staging of this tree. Open recorders stay with this tree.
    pub fn branch(&self) -> HostTree {
        let mut ancestry = self.ancestry.clone();
        ancestry.insert(self.id);

        HostTree {
            id: next_tree_id(),
            ancestry,
            base: Arc::clone(&self.base),
            staging: self.staging.clone(),
            open_updates: OrdSet::new(),
        }
    }

    pub(super) fn is_clean(&self) -> bool {
        self.staging.is_empty()
    }
}
