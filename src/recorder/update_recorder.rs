use std::hash::Hasher;
use std::ops::Range;

use bytes::Bytes;
use metrohash::MetroHash64;
use snafu::{Snafu, ensure};

use super::apply::{self, Insertion};
use crate::path::TreePath;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Which way an insertion leans when several land on the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Edits recorded against the content a file had when the recorder was opened.
///
/// When that content starts with a UTF-8 byte order mark, positions are
/// counted from the first byte after it and the mark is kept on apply.
#[derive(Debug)]
pub struct UpdateRecorder {
    owner: u64,
    path: TreePath,
    original: Bytes,
    fingerprint: u64,
    bom_len: usize,
    insertions: Vec<Insertion>,
    removals: Vec<Range<usize>>,
}

impl UpdateRecorder {
    pub(crate) fn new(owner: u64, path: TreePath, original: Bytes) -> Self {
        let bom_len = if original.starts_with(UTF8_BOM) {
            UTF8_BOM.len()
        } else {
            0
        };

        Self {
            owner,
            path,
            fingerprint: fingerprint(&original),
            original,
            bom_len,
            insertions: Vec::new(),
            removals: Vec::new(),
        }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// Content the recorder was opened on, byte order mark included.
    pub fn original(&self) -> &Bytes {
        &self.original
    }

    /// Length of the addressable text, i.e. without the byte order mark.
    pub fn text_len(&self) -> usize {
        self.original.len() - self.bom_len
    }

    /// True when no edit has been recorded.
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.removals.is_empty()
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn insert_left(
        &mut self,
        position: usize,
        content: impl Into<Bytes>,
    ) -> Result<&mut Self, RecorderError> {
        self.insert(Side::Left, position, content)
    }

    pub fn insert_right(
        &mut self,
        position: usize,
        content: impl Into<Bytes>,
    ) -> Result<&mut Self, RecorderError> {
        self.insert(Side::Right, position, content)
    }

    pub fn insert(
        &mut self,
        side: Side,
        position: usize,
        content: impl Into<Bytes>,
    ) -> Result<&mut Self, RecorderError> {
        self.check_bounds(position)?;
        let sequence = self.insertions.len();
        self.insertions.push(Insertion {
            position,
            side,
            sequence,
            content: content.into(),
        });
        Ok(self)
    }

    /// Marks `length` original bytes starting at `position` as removed.
    pub fn remove(&mut self, position: usize, length: usize) -> Result<&mut Self, RecorderError> {
        self.check_bounds(position)?;
        let end = position.saturating_add(length);
        self.check_bounds(end)?;
        self.removals.push(position..end);
        Ok(self)
    }

    /// Content produced by applying every recorded edit to the original.
    pub fn apply(&self) -> Bytes {
        if self.is_empty() {
            return self.original.clone();
        }

        let (bom, text) = self.original.split_at(self.bom_len);
        let mut output = Vec::with_capacity(self.original.len());
        output.extend_from_slice(bom);
        output.extend(apply::apply(text, &self.insertions, &self.removals));
        Bytes::from(output)
    }

    fn check_bounds(&self, index: usize) -> Result<(), RecorderError> {
        ensure!(
            index <= self.text_len(),
            IndexOutOfBoundSnafu {
                path: self.path.clone(),
                index,
                length: self.text_len(),
            }
        );
        Ok(())
    }
}

pub(crate) fn fingerprint(content: &[u8]) -> u64 {
    let mut hasher = MetroHash64::default();
    hasher.write(content);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum RecorderError {
    #[snafu(display(
        "Index {} is out of bounds for '{}' ({} bytes)",
        index,
        path,
        length
    ))]
    IndexOutOfBound {
        path: TreePath,
        index: usize,
        length: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn recorder(content: &'static [u8]) -> UpdateRecorder {
        UpdateRecorder::new(0, TreePath::parse("/file").unwrap(), Bytes::from_static(content))
    }

    #[test]
    fn insert_left_prefixes_content() {
        let mut recorder = recorder(b"testing 1 2");
        recorder.insert_left(8, "testing ").unwrap();
        assert_eq!(recorder.apply(), Bytes::from("testing testing 1 2"));
    }

    #[rstest]
    #[case(0, 3, "lo world")]
    #[case(5, 6, "hello")]
    #[case(0, 11, "")]
    #[case(3, 0, "hello world")]
    fn remove_ranges(#[case] position: usize, #[case] length: usize, #[case] expected: &str) {
        let mut recorder = recorder(b"hello world");
        recorder.remove(position, length).unwrap();
        assert_eq!(recorder.apply(), Bytes::copy_from_slice(expected.as_bytes()));
    }

    #[test]
    fn edits_chain_against_original_offsets() {
        let mut recorder = recorder(b"hello world");
        recorder
            .insert_right(6, "big ")
            .unwrap()
            .remove(0, 5)
            .unwrap()
            .insert_left(0, "goodbye")
            .unwrap();
        assert_eq!(recorder.apply(), Bytes::from("goodbye big world"));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut recorder = recorder(b"abc");
        assert!(matches!(
            recorder.insert_left(4, "x"),
            Err(RecorderError::IndexOutOfBound { index: 4, length: 3, .. })
        ));
        assert!(matches!(
            recorder.remove(2, 5),
            Err(RecorderError::IndexOutOfBound { index: 7, .. })
        ));
        assert!(recorder.is_empty());
    }

    #[test]
    fn byte_order_mark_is_preserved_and_skipped() {
        let mut recorder = recorder(b"\xEF\xBB\xBFhello");
        assert_eq!(recorder.text_len(), 5);
        recorder.insert_left(0, "say ").unwrap().remove(4, 1).unwrap();
        assert_eq!(recorder.apply(), Bytes::from_static(b"\xEF\xBB\xBFsay hell"));
    }

    #[test]
    fn untouched_recorder_returns_original() {
        let recorder = recorder(b"same");
        assert_eq!(recorder.apply(), Bytes::from_static(b"same"));
        assert_eq!(recorder.fingerprint(), fingerprint(b"same"));
    }
}
