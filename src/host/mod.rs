//! Filesystem capabilities the tree reads from and the sinks write to.
//!
//! Trees only ever read from their base host. Sinks read from and write to
//! their output host. Memory-backed and disk-backed hosts are interchangeable.

mod disk_host;
mod memory_host;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use snafu::Snafu;

use crate::path::TreePath;

pub use disk_host::DiskHost;
pub use memory_host::MemoryHost;

pub trait Host: fmt::Debug + Send + Sync {
    fn read(&self, path: &TreePath) -> Result<Bytes, HostError>;
    fn write(&self, path: &TreePath, content: Bytes) -> Result<(), HostError>;
    fn exists(&self, path: &TreePath) -> bool;
    fn is_file(&self, path: &TreePath) -> bool;
    fn is_directory(&self, path: &TreePath) -> bool;
    /// Removes a file, or a directory together with everything below it.
    fn delete(&self, path: &TreePath) -> Result<(), HostError>;
    fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), HostError>;
    /// Names of the direct children of a directory, sorted.
    fn list(&self, path: &TreePath) -> Result<Vec<String>, HostError>;
}

/// Every file below `dir` on `host`, depth first, in listing order.
pub fn walk_files(host: &dyn Host, dir: &TreePath) -> Result<Vec<TreePath>, HostError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.clone()];

    while let Some(current) = pending.pop() {
        let mut subdirs = Vec::new();
        for name in host.list(&current)? {
            let Ok(child) = current.join(&name) else {
                continue;
            };
            if host.is_directory(&child) {
                subdirs.push(child);
            } else {
                files.push(child);
            }
        }
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(files)
}

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HostError {
    #[snafu(display("Path '{}' does not exist", path))]
    NotFound { path: TreePath },
    #[snafu(display("Path '{}' already exists", path))]
    AlreadyExists { path: TreePath },
    #[snafu(display("Path '{}' is a directory", path))]
    IsDirectory { path: TreePath },
    #[snafu(display("Path '{}' is not a directory", path))]
    NotADirectory { path: TreePath },
    #[snafu(display("I/O failure on '{}'", path))]
    Io {
        path: TreePath,
        #[snafu(source(from(std::io::Error, Arc::new)))]
        source: Arc<std::io::Error>,
    },
}

impl HostError {
    pub fn path(&self) -> &TreePath {
        match self {
            HostError::NotFound { path }
            | HostError::AlreadyExists { path }
            | HostError::IsDirectory { path }
            | HostError::NotADirectory { path }
            | HostError::Io { path, .. } => path,
        }
    }
}
