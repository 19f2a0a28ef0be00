use derive_more::{AsRef, Display};
use snafu::Snafu;

const SEPARATOR: char = '/';

/// A normalized absolute path inside a tree.
///
/// Backslashes are treated as separators, repeated separators and `.` segments
/// are dropped and `..` segments are resolved. The result always starts with
/// `/` and never ends with one, except for the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRef)]
#[as_ref(forward)]
pub struct TreePath(String);

impl TreePath {
    pub fn root() -> Self {
        TreePath(SEPARATOR.to_string())
    }

    pub fn parse(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let raw = raw.as_ref();
        let unified = raw.replace('\\', "/");

        let mut segments: Vec<&str> = Vec::new();
        for segment in unified.split(SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return EscapesRootSnafu { path: raw }.fail();
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(Self::from_segments(segments))
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut path = String::new();
        for segment in segments {
            path.push(SEPARATOR);
            path.push_str(segment);
        }
        if path.is_empty() {
            return Self::root();
        }
        TreePath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|segment| !segment.is_empty())
    }

    /// Last segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        let count = self.segments().count();
        Some(Self::from_segments(self.segments().take(count - 1)))
    }

    /// Joins a relative fragment onto this path and normalizes the result.
    pub fn join(&self, fragment: impl AsRef<str>) -> Result<TreePath, PathError> {
        Self::parse(format!("{}/{}", self.0, fragment.as_ref()))
    }

    /// Segment-wise prefix check: `/a` is a prefix of `/a/b` but not of `/ab`.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// First segment of `self` below `dir`, if `self` lives under `dir`.
    pub fn child_of(&self, dir: &TreePath) -> Option<&str> {
        if self == dir || !self.starts_with(dir) {
            return None;
        }
        let skip = dir.segments().count();
        self.segments().nth(skip)
    }
}

impl TryFrom<&str> for TreePath {
    type Error = PathError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum PathError {
    #[snafu(display("Path '{}' escapes the root of the tree", path))]
    EscapesRoot { path: String },
}
