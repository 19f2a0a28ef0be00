use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use snafu::{ResultExt, ensure};
use tracing::debug;

use super::{
    AlreadyExistsSnafu, Host, HostError, IoSnafu, IsDirectorySnafu, NotADirectorySnafu,
    NotFoundSnafu,
};
use crate::path::TreePath;

/// Host backed by a directory on the real filesystem. Tree paths are resolved
/// below `root`; the root itself is the tree's `/`.
#[derive(Debug, Clone)]
pub struct DiskHost {
    root: PathBuf,
}

impl DiskHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        debug!("Disk host rooted at {}", root.display());
        Self { root }
    }

    fn resolve(&self, path: &TreePath) -> PathBuf {
        let mut resolved = self.root.clone();
        resolved.extend(path.segments());
        resolved
    }

    fn not_found_or_io(path: &TreePath, error: std::io::Error) -> HostError {
        match error.kind() {
            ErrorKind::NotFound => HostError::NotFound { path: path.clone() },
            _ => HostError::Io {
                path: path.clone(),
                source: Arc::new(error),
            },
        }
    }
}

impl Host for DiskHost {
    fn read(&self, path: &TreePath) -> Result<Bytes, HostError> {
        let resolved = self.resolve(path);
        ensure!(!resolved.is_dir(), IsDirectorySnafu { path: path.clone() });
        fs::read(&resolved)
            .map(Bytes::from)
            .map_err(|error| Self::not_found_or_io(path, error))
    }

    fn write(&self, path: &TreePath, content: Bytes) -> Result<(), HostError> {
        let resolved = self.resolve(path);
        ensure!(!resolved.is_dir(), IsDirectorySnafu { path: path.clone() });

        if let Some(parent) = resolved.parent() {
            ensure!(
                !parent.is_file(),
                NotADirectorySnafu {
                    path: path.parent().unwrap_or_else(TreePath::root)
                }
            );
            fs::create_dir_all(parent).context(IoSnafu { path: path.clone() })?;
        }
        fs::write(&resolved, &content).context(IoSnafu { path: path.clone() })
    }

    fn exists(&self, path: &TreePath) -> bool {
        self.resolve(path).try_exists().unwrap_or(false)
    }

    fn is_file(&self, path: &TreePath) -> bool {
        self.resolve(path).is_file()
    }

    fn is_directory(&self, path: &TreePath) -> bool {
        self.resolve(path).is_dir()
    }

    fn delete(&self, path: &TreePath) -> Result<(), HostError> {
        let resolved = self.resolve(path);
        if resolved.is_dir() {
            fs::remove_dir_all(&resolved).context(IoSnafu { path: path.clone() })
        } else {
            fs::remove_file(&resolved).map_err(|error| Self::not_found_or_io(path, error))
        }
    }

    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError> {
        let source = self.resolve(from);
        let target = self.resolve(to);
        ensure!(self.exists(from), NotFoundSnafu { path: from.clone() });
        ensure!(!self.exists(to), AlreadyExistsSnafu { path: to.clone() });

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path: to.clone() })?;
        }
        fs::rename(&source, &target).context(IoSnafu { path: from.clone() })
    }

    fn list(&self, path: &TreePath) -> Result<Vec<String>, HostError> {
        let resolved = self.resolve(path);
        ensure!(!resolved.is_file(), NotADirectorySnafu { path: path.clone() });

        let mut names = fs::read_dir(&resolved)
            .map_err(|error| Self::not_found_or_io(path, error))?
            .map(|entry| {
                entry
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .context(IoSnafu { path: path.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }
}
