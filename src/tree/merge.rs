use derive_more::{BitOr, BitOrAssign};
use snafu::ensure;
use tracing::debug;

use super::{Action, HostTree, MergeConflictSnafu, TreeError};

/// Conflicts a merge is allowed to resolve by letting the incoming change win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BitOr, BitOrAssign)]
pub struct MergeStrategy(u8);

impl MergeStrategy {
    pub const DEFAULT: MergeStrategy = MergeStrategy(0);
    pub const ALLOW_OVERWRITE_CONFLICT: MergeStrategy = MergeStrategy(1 << 1);
    pub const ALLOW_CREATION_CONFLICT: MergeStrategy = MergeStrategy(1 << 2);
    pub const ALLOW_DELETE_CONFLICT: MergeStrategy = MergeStrategy(1 << 3);
    pub const OVERWRITE: MergeStrategy = MergeStrategy(0b1110);

    pub fn contains(self, other: MergeStrategy) -> bool {
        self.0 & other.0 == other.0
    }
}

impl HostTree {
    /// Replays the changes staged on `other` onto this tree.
    ///
    /// Either every action applies or this tree is left as it was. Merging a
    /// branch back into one of its ancestors lets the branch win every
    /// content conflict.
    pub fn merge(&mut self, other: &HostTree, strategy: MergeStrategy) -> Result<(), TreeError> {
        if other.id == self.id || other.is_clean() {
            return Ok(());
        }

        let mut strategy = strategy;
        if other.ancestry.contains(&self.id) {
            strategy |= MergeStrategy::OVERWRITE;
        }

        let actions = other.actions();
        debug!(
            "Merging {} actions of tree {} into tree {}",
            actions.len(),
            other.id,
            self.id
        );

        let snapshot = self.staging.clone();
        for action in actions {
            let (kind, path) = (action.kind(), action.path().clone());
            if let Err(error) = self.apply(action, strategy) {
                debug!(
                    "Merge into tree {} rolled back at {} of '{}': {}",
                    self.id, kind, path, error
                );
                self.staging = snapshot;
                return Err(error);
            }
        }
        Ok(())
    }

    /// Applies a single action with the conflict rules of [`HostTree::merge`].
    pub fn apply(&mut self, action: Action, strategy: MergeStrategy) -> Result<(), TreeError> {
        let base = self.base.as_ref();
        let staging = &mut self.staging;

        match action {
            Action::Create { path, content } => {
                if !staging.exists(base, &path) {
                    return staging.create(base, &path, content);
                }
                if staging.read(base, &path)? == content {
                    return Ok(());
                }
                ensure!(
                    strategy.contains(MergeStrategy::ALLOW_CREATION_CONFLICT),
                    MergeConflictSnafu { path }
                );
                staging.overwrite(base, &path, content)
            }
            Action::Overwrite { path, content } => {
                // Gone here, whether deleted or renamed away.
                if !staging.exists(base, &path) {
                    ensure!(
                        strategy.contains(MergeStrategy::ALLOW_OVERWRITE_CONFLICT),
                        MergeConflictSnafu { path }
                    );
                    return staging.create(base, &path, content);
                }
                if staging.is_modified(&path) {
                    if staging.read(base, &path)? == content {
                        return Ok(());
                    }
                    ensure!(
                        strategy.contains(MergeStrategy::ALLOW_OVERWRITE_CONFLICT),
                        MergeConflictSnafu { path }
                    );
                }
                staging.overwrite(base, &path, content)
            }
            Action::Rename { from, to } => {
                if staging.moved_to(&from) == Some(&to) {
                    return Ok(());
                }
                ensure!(
                    !staging.is_deleted(base, &from) && staging.moved_to(&from).is_none(),
                    MergeConflictSnafu { path: from }
                );
                staging.rename(base, &from, &to)
            }
            Action::Delete { path } => {
                if staging.exists(base, &path) {
                    return staging.delete(base, &path);
                }
                if staging.is_deleted(base, &path) {
                    return Ok(());
                }
                ensure!(
                    strategy.contains(MergeStrategy::ALLOW_DELETE_CONFLICT),
                    MergeConflictSnafu { path }
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use rstest::*;

    use super::*;
    use crate::host::{Host, MemoryHost};

    #[fixture]
    fn base() -> Arc<dyn Host> {
        Arc::new(
            MemoryHost::with_files([("/hello", "hello"), ("/sub/file1", "file1")]).unwrap(),
        )
    }

    #[rstest]
    #[case(MergeStrategy::DEFAULT, false, false, false)]
    #[case(MergeStrategy::ALLOW_CREATION_CONFLICT, false, true, false)]
    #[case(
        MergeStrategy::ALLOW_OVERWRITE_CONFLICT | MergeStrategy::ALLOW_DELETE_CONFLICT,
        true,
        false,
        true
    )]
    #[case(MergeStrategy::OVERWRITE, true, true, true)]
    fn strategy_bits(
        #[case] strategy: MergeStrategy,
        #[case] overwrite: bool,
        #[case] creation: bool,
        #[case] delete: bool,
    ) {
        assert_eq!(
            strategy.contains(MergeStrategy::ALLOW_OVERWRITE_CONFLICT),
            overwrite
        );
        assert_eq!(
            strategy.contains(MergeStrategy::ALLOW_CREATION_CONFLICT),
            creation
        );
        assert_eq!(strategy.contains(MergeStrategy::ALLOW_DELETE_CONFLICT), delete);
    }

    #[rstest]
    fn merges_independent_changes(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.create("/mine", "a").unwrap();

        let mut other = HostTree::new(base);
        other.create("/theirs", "b").unwrap();
        other.delete("/sub/file1").unwrap();
        other.rename("/hello", "/renamed").unwrap();

        tree.merge(&other, MergeStrategy::DEFAULT).unwrap();

        let files: Vec<String> = tree.files().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(files, ["/mine", "/renamed", "/theirs"]);
        assert_eq!(tree.read("/renamed").unwrap(), Bytes::from("hello"));
    }

    #[rstest]
    fn conflicting_merge_leaves_tree_untouched(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.create("/a", "1").unwrap();
        let before = tree.actions();

        let mut other = HostTree::new(base);
        other.create("/b", "untouched").unwrap();
        other.create("/a", "2").unwrap();

        let result = tree.merge(&other, MergeStrategy::DEFAULT);
        assert!(matches!(result, Err(TreeError::MergeConflict { .. })));
        assert_eq!(tree.actions(), before);
        assert!(!tree.exists("/b"));

        tree.merge(&other, MergeStrategy::ALLOW_CREATION_CONFLICT)
            .unwrap();
        assert_eq!(tree.read("/a").unwrap(), Bytes::from("2"));
        assert!(tree.exists("/b"));
    }

    #[rstest]
    fn identical_creations_do_not_conflict(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.create("/a", "same").unwrap();
        let mut other = HostTree::new(base);
        other.create("/a", "same").unwrap();

        tree.merge(&other, MergeStrategy::DEFAULT).unwrap();
        assert_eq!(tree.actions().len(), 1);
    }

    #[rstest]
    fn branch_wins_when_merged_into_ancestor(base: Arc<dyn Host>) {
        let mut parent = HostTree::new(base);
        let mut branch = parent.branch();
        parent.overwrite("/hello", "parent").unwrap();
        branch.overwrite("/hello", "branch").unwrap();

        parent.merge(&branch, MergeStrategy::DEFAULT).unwrap();
        assert_eq!(parent.read("/hello").unwrap(), Bytes::from("branch"));
    }

    #[rstest]
    fn unrelated_overwrites_conflict(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.overwrite("/hello", "mine").unwrap();
        let mut other = HostTree::new(base);
        other.overwrite("/hello", "theirs").unwrap();

        assert!(matches!(
            tree.merge(&other, MergeStrategy::DEFAULT),
            Err(TreeError::MergeConflict { .. })
        ));
        tree.merge(&other, MergeStrategy::ALLOW_OVERWRITE_CONFLICT)
            .unwrap();
        assert_eq!(tree.read("/hello").unwrap(), Bytes::from("theirs"));
    }

    #[rstest]
    fn diverging_renames_always_conflict(base: Arc<dyn Host>) {
        let mut parent = HostTree::new(base);
        let mut branch = parent.branch();
        parent.rename("/hello", "/left").unwrap();
        branch.rename("/hello", "/right").unwrap();

        assert!(matches!(
            parent.merge(&branch, MergeStrategy::OVERWRITE),
            Err(TreeError::MergeConflict { .. })
        ));
        assert!(parent.exists("/left"));
        assert!(!parent.exists("/right"));
    }

    #[rstest]
    fn overwriting_a_renamed_file_needs_permission(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.rename("/hello", "/moved").unwrap();
        let before = tree.actions();
        let mut other = HostTree::new(base);
        other.overwrite("/hello", "theirs").unwrap();

        assert!(matches!(
            tree.merge(&other, MergeStrategy::DEFAULT),
            Err(TreeError::MergeConflict { .. })
        ));
        assert_eq!(tree.actions(), before);
        assert!(!tree.exists("/hello"));

        tree.merge(&other, MergeStrategy::ALLOW_OVERWRITE_CONFLICT)
            .unwrap();
        assert_eq!(tree.read("/hello").unwrap(), Bytes::from("theirs"));
        assert_eq!(tree.read("/moved").unwrap(), Bytes::from("hello"));
    }

    #[rstest]
    fn overwriting_a_deleted_file_needs_permission(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.delete("/sub/file1").unwrap();
        let mut other = HostTree::new(base);
        other.overwrite("/sub/file1", "theirs").unwrap();

        assert!(matches!(
            tree.merge(&other, MergeStrategy::DEFAULT),
            Err(TreeError::MergeConflict { .. })
        ));
        tree.merge(&other, MergeStrategy::ALLOW_OVERWRITE_CONFLICT)
            .unwrap();
        assert_eq!(tree.read("/sub/file1").unwrap(), Bytes::from("theirs"));
    }

    #[rstest]
    fn merges_a_rename_chain_ending_in_a_delete(base: Arc<dyn Host>) {
        let mut other = HostTree::new(Arc::clone(&base));
        other.rename("/sub/file1", "/c").unwrap();
        other.rename("/hello", "/sub/file1").unwrap();
        other.delete("/c").unwrap();

        let mut tree = HostTree::new(base);
        tree.merge(&other, MergeStrategy::DEFAULT).unwrap();

        assert_eq!(tree.actions(), other.actions());
        assert_eq!(tree.read("/sub/file1").unwrap(), Bytes::from("hello"));
        assert!(!tree.exists("/hello"));
    }

    #[rstest]
    fn deleting_missing_file_needs_permission(base: Arc<dyn Host>) {
        let mut tree = HostTree::new(Arc::clone(&base));
        tree.rename("/hello", "/moved").unwrap();
        let mut other = HostTree::new(base);
        other.delete("/hello").unwrap();

        assert!(matches!(
            tree.merge(&other, MergeStrategy::DEFAULT),
            Err(TreeError::MergeConflict { .. })
        ));
        tree.merge(&other, MergeStrategy::ALLOW_DELETE_CONFLICT)
            .unwrap();
        assert!(tree.exists("/moved"));
    }
}
