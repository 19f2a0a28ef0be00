use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use snafu::ensure;

use super::{
    AlreadyExistsSnafu, Host, HostError, IsDirectorySnafu, NotADirectorySnafu, NotFoundSnafu,
};
use crate::path::{PathError, TreePath};

/// In-memory host. Directories are implicit: a directory exists as long as
/// some file lives below it, and the root always exists.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    files: Arc<RwLock<BTreeMap<TreePath, Bytes>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Result<Self, PathError>
    where
        P: AsRef<str>,
        C: Into<Bytes>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| Ok((TreePath::parse(path)?, content.into())))
            .collect::<Result<BTreeMap<_, _>, PathError>>()?;

        Ok(Self {
            files: Arc::new(RwLock::new(files)),
        })
    }

    /// Snapshot of every file currently held.
    pub fn files(&self) -> BTreeMap<TreePath, Bytes> {
        self.files.read().clone()
    }

    fn directory_exists(files: &BTreeMap<TreePath, Bytes>, path: &TreePath) -> bool {
        path.is_root() || files.keys().any(|file| file.child_of(path).is_some())
    }

    fn has_file_ancestor(files: &BTreeMap<TreePath, Bytes>, path: &TreePath) -> bool {
        let mut current = path.parent();
        while let Some(dir) = current {
            if files.contains_key(&dir) {
                return true;
            }
            current = dir.parent();
        }
        false
    }
}

impl Host for MemoryHost {
    fn read(&self, path: &TreePath) -> Result<Bytes, HostError> {
        let files = self.files.read();
        if let Some(content) = files.get(path) {
            return Ok(content.clone());
        }
        ensure!(
            !Self::directory_exists(&files, path),
            IsDirectorySnafu { path: path.clone() }
        );
        NotFoundSnafu { path: path.clone() }.fail()
    }

    fn write(&self, path: &TreePath, content: Bytes) -> Result<(), HostError> {
        let mut files = self.files.write();
        ensure!(
            files.contains_key(path) || !Self::directory_exists(&files, path),
            IsDirectorySnafu { path: path.clone() }
        );
        ensure!(
            !Self::has_file_ancestor(&files, path),
            NotADirectorySnafu { path: path.clone() }
        );
        files.insert(path.clone(), content);
        Ok(())
    }

    fn exists(&self, path: &TreePath) -> bool {
        let files = self.files.read();
        files.contains_key(path) || Self::directory_exists(&files, path)
    }

    fn is_file(&self, path: &TreePath) -> bool {
        self.files.read().contains_key(path)
    }

    fn is_directory(&self, path: &TreePath) -> bool {
        Self::directory_exists(&self.files.read(), path)
    }

    fn delete(&self, path: &TreePath) -> Result<(), HostError> {
        let mut files = self.files.write();
        if files.remove(path).is_some() {
            return Ok(());
        }
        ensure!(
            Self::directory_exists(&files, path),
            NotFoundSnafu { path: path.clone() }
        );
        files.retain(|file, _| !file.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError> {
        let mut files = self.files.write();
        ensure!(
            !files.contains_key(to) && !Self::directory_exists(&files, to),
            AlreadyExistsSnafu { path: to.clone() }
        );

        if let Some(content) = files.remove(from) {
            files.insert(to.clone(), content);
            return Ok(());
        }

        ensure!(
            !from.is_root() && Self::directory_exists(&files, from),
            NotFoundSnafu { path: from.clone() }
        );
        let moved: Vec<TreePath> = files
            .keys()
            .filter(|file| file.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            let Some(content) = files.remove(&old) else {
                continue;
            };
            let suffix = &old.as_str()[from.as_str().len()..];
            let Ok(new) = TreePath::parse(format!("{to}{suffix}")) else {
                continue;
            };
            files.insert(new, content);
        }
        Ok(())
    }

    fn list(&self, path: &TreePath) -> Result<Vec<String>, HostError> {
        let files = self.files.read();
        ensure!(
            !files.contains_key(path),
            NotADirectorySnafu { path: path.clone() }
        );
        ensure!(
            Self::directory_exists(&files, path),
            NotFoundSnafu { path: path.clone() }
        );

        let names: BTreeSet<String> = files
            .keys()
            .filter_map(|file| file.child_of(path))
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }
}
