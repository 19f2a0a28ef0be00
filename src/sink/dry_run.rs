use std::sync::Arc;

use tracing::info;

use super::event::ReportChannel;
use super::plan::Plan;
use super::{Reporter, Sink, SinkError, SinkOptions, warn_open_updates};
use crate::host::Host;
use crate::tree::HostTree;

/// Reports what committing a tree would do without touching the output host.
///
/// Conflicts are reported as `error` events and do not fail the commit.
#[derive(Debug)]
pub struct DryRunSink {
    host: Arc<dyn Host>,
    options: SinkOptions,
    channel: ReportChannel,
}

impl DryRunSink {
    pub fn new(host: Arc<dyn Host>, options: SinkOptions) -> Self {
        Self {
            host,
            options,
            channel: ReportChannel::new(),
        }
    }
}

impl Sink for DryRunSink {
    fn reporter(&mut self) -> Option<Reporter> {
        self.channel.reporter()
    }

    async fn commit(&mut self, tree: HostTree) -> Result<(), SinkError> {
        let sender = self.channel.open()?;
        warn_open_updates(&tree);

        let plan = Plan::build(self.host.as_ref(), tree.actions(), self.options.strict);
        let events = plan.events();
        info!(
            "Dry run of tree {}: {} events, {} conflicts",
            tree.id(),
            events.len(),
            plan.conflicts.len()
        );

        for event in events {
            sender.send(Ok(event));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::StreamExt;

    use super::*;
    use crate::host::MemoryHost;
    use crate::sink::{ConflictKind, EventKind, SinkEvent};

    fn base() -> MemoryHost {
        MemoryHost::with_files([
            ("/hello", "hello"),
            ("/sub/file1", "file1"),
            ("/sub/directory/file2", "file2"),
        ])
        .unwrap()
    }

    fn stage_changes(tree: &mut HostTree) {
        tree.create("/test", "testing 1 2").unwrap();
        let mut recorder = tree.begin_update("/test").unwrap();
        recorder.insert_left(8, "testing ").unwrap();
        tree.commit_update(recorder).unwrap();
        tree.overwrite("/hello", "world").unwrap();
    }

    #[compio::test]
    async fn host_create_tree_reports_every_file_as_created() {
        let mut tree = HostTree::host_create(&base()).unwrap();
        stage_changes(&mut tree);

        let mut sink = DryRunSink::new(Arc::new(MemoryHost::new()), SinkOptions::default());
        let reporter = sink.reporter().unwrap();
        sink.commit(tree).await.unwrap();

        let events = reporter.collect_events().await.unwrap();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|event| event.kind() == EventKind::Create));

        let test = events
            .iter()
            .find(|event| event.path().as_str() == "/test")
            .unwrap();
        assert_eq!(test.content(), Some(&Bytes::from("testing testing 1 2")));
    }

    #[compio::test]
    async fn host_tree_reports_create_and_update() {
        let mut tree = HostTree::new(Arc::new(base()));
        stage_changes(&mut tree);

        let output = MemoryHost::with_files([("/hello", "hello")]).unwrap();
        let mut sink = DryRunSink::new(Arc::new(output.clone()), SinkOptions::default());
        let reporter = sink.reporter().unwrap();
        sink.commit(tree).await.unwrap();

        let events = reporter.collect_events().await.unwrap();
        let summary: Vec<String> = events
            .iter()
            .map(|event| format!("{} {}", event.kind(), event.path()))
            .collect();
        assert_eq!(summary, ["create /test", "update /hello"]);
        assert_eq!(output.files().len(), 1);
    }

    #[compio::test]
    async fn conflicts_are_reported_as_error_events() {
        let mut tree = HostTree::new(Arc::new(base()));
        tree.delete("/sub/file1").unwrap();
        tree.create("/test", "x").unwrap();

        let output = MemoryHost::with_files([("/test", "old")]).unwrap();
        let options = SinkOptions {
            strict: true,
            ..SinkOptions::default()
        };
        let mut sink = DryRunSink::new(Arc::new(output), options);
        let mut reporter = sink.reporter().unwrap();
        sink.commit(tree).await.unwrap();

        let mut events = Vec::new();
        while let Some(item) = reporter.next().await {
            events.push(item.unwrap());
        }
        assert_eq!(
            events,
            [
                SinkEvent::Error {
                    path: "/sub/file1".try_into().unwrap(),
                    description: ConflictKind::DoesNotExist,
                },
                SinkEvent::Error {
                    path: "/test".try_into().unwrap(),
                    description: ConflictKind::AlreadyExist,
                },
            ]
        );
    }

    async fn dry_run(tree: HostTree) -> Vec<SinkEvent> {
        let mut sink = DryRunSink::new(Arc::new(MemoryHost::new()), SinkOptions::default());
        let reporter = sink.reporter().unwrap();
        sink.commit(tree).await.unwrap();
        let mut events = reporter.collect_events().await.unwrap();
        events.sort_by(|left, right| {
            (left.kind().to_string(), left.path()).cmp(&(right.kind().to_string(), right.path()))
        });
        events
    }

    #[compio::test]
    async fn same_tree_reports_same_events_on_independent_hosts() {
        let mut tree = HostTree::host_create(&base()).unwrap();
        stage_changes(&mut tree);
        tree.rename("/sub/file1", "/moved").unwrap();
        tree.delete("/sub/directory").unwrap();
        let copy = tree.branch();

        let first = dry_run(tree).await;
        let second = dry_run(copy).await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[compio::test]
    async fn commits_only_once() {
        let mut sink = DryRunSink::new(Arc::new(MemoryHost::new()), SinkOptions::default());
        let tree = HostTree::new(Arc::new(base()));
        sink.commit(tree).await.unwrap();

        let again = HostTree::new(Arc::new(base()));
        assert!(matches!(
            sink.commit(again).await,
            Err(SinkError::AlreadyCommitted)
        ));
        assert!(sink.reporter().is_some());
        assert!(sink.reporter().is_none());
    }
}
