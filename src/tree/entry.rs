use std::collections::BTreeSet;

use bytes::Bytes;
use snafu::ResultExt;

use super::{HostTree, PathSnafu, TreeError};
use crate::path::TreePath;

/// Content of one file at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: TreePath,
    pub content: Bytes,
}

/// A directory of a tree. Directories have no content of their own, they
/// exist through the files below them.
#[derive(Debug, Clone)]
pub struct DirEntry<'a> {
    tree: &'a HostTree,
    path: TreePath,
}

impl<'a> DirEntry<'a> {
    pub(super) fn new(tree: &'a HostTree, path: TreePath) -> Self {
        Self { tree, path }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn parent(&self) -> Option<DirEntry<'a>> {
        self.path.parent().map(|path| DirEntry::new(self.tree, path))
    }

    /// Names of the files directly inside this directory, sorted.
    pub fn subfiles(&self) -> Result<Vec<String>, TreeError> {
        Ok(self.children()?.0.into_iter().collect())
    }

    /// Names of the directories directly inside this directory, sorted.
    pub fn subdirs(&self) -> Result<Vec<String>, TreeError> {
        Ok(self.children()?.1.into_iter().collect())
    }

    fn children(&self) -> Result<(BTreeSet<String>, BTreeSet<String>), TreeError> {
        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();

        for file in self.tree.files_under(&self.path)? {
            let Some(name) = file.child_of(&self.path) else {
                continue;
            };
            if file.parent().as_ref() == Some(&self.path) {
                files.insert(name.to_string());
            } else {
                dirs.insert(name.to_string());
            }
        }
        Ok((files, dirs))
    }

    pub fn file(&self, name: &str) -> Option<FileEntry> {
        let path = self.path.join(name).ok()?;
        self.tree.get(&path)
    }

    pub fn dir(&self, name: &str) -> Result<DirEntry<'a>, TreeError> {
        let path = self.path.join(name).context(PathSnafu)?;
        Ok(DirEntry::new(self.tree, path))
    }

    /// Calls `visitor` once for every file below this directory, sorted.
    pub fn visit(&self, mut visitor: impl FnMut(&TreePath)) -> Result<(), TreeError> {
        for file in self.tree.files_under(&self.path)? {
            visitor(&file);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::host::MemoryHost;

    fn tree() -> HostTree {
        let base = MemoryHost::with_files([
            ("/hello", "hello"),
            ("/sub/file1", "file1"),
            ("/sub/directory/file2", "file2"),
        ])
        .unwrap();
        HostTree::new(Arc::new(base))
    }

    #[test]
    fn lists_direct_children() {
        let mut tree = tree();
        tree.create("/sub/other/file3", "file3").unwrap();
        tree.delete("/sub/directory/file2").unwrap();

        let sub = tree.get_dir("/sub").unwrap();
        assert_eq!(sub.subfiles().unwrap(), ["file1"]);
        assert_eq!(sub.subdirs().unwrap(), ["other"]);

        let root = sub.parent().unwrap();
        assert!(root.path().is_root());
        assert_eq!(root.subfiles().unwrap(), ["hello"]);
        assert_eq!(root.subdirs().unwrap(), ["sub"]);
    }

    #[test]
    fn resolves_files_and_nested_dirs() {
        let tree = tree();
        let root = tree.get_dir("/").unwrap();

        let entry = root.dir("sub").unwrap().file("file1").unwrap();
        assert_eq!(entry.path.as_str(), "/sub/file1");
        assert_eq!(entry.content, Bytes::from("file1"));
        assert!(root.file("missing").is_none());

        let mut visited = Vec::new();
        root.dir("sub")
            .unwrap()
            .visit(|path| visited.push(path.to_string()))
            .unwrap();
        assert_eq!(visited, ["/sub/directory/file2", "/sub/file1"]);
    }
}
