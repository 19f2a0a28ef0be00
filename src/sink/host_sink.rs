use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::available_parallelism;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use snafu::ResultExt;
use tracing::{debug, info};

use super::event::{ReportChannel, ReportSender};
use super::plan::Plan;
use super::{
    DispatcherSnafu, EventKind, Reporter, Sink, SinkCreationError, SinkError, SinkEvent,
    SinkOptions, warn_open_updates,
};
use crate::host::{Host, HostError};
use crate::tree::HostTree;

/// Applies a tree's actions to the output host.
///
/// Any conflict fails the commit before the host is touched. Deletes go
/// first, then renames one at a time, then creations and updates spread over
/// the dispatcher's workers. The first failing write ends the commit; what
/// was already written stays written.
pub struct HostSink {
    host: Arc<dyn Host>,
    options: SinkOptions,
    dispatcher: Dispatcher,
    channel: ReportChannel,
}

impl HostSink {
    pub fn new(host: Arc<dyn Host>, options: SinkOptions) -> Result<Self, SinkCreationError> {
        let workers = options.workers.unwrap_or_else(Self::determine_worker_count);
        debug!("Using {} worker threads for host writes", workers);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(workers)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            host,
            options,
            dispatcher,
            channel: ReportChannel::new(),
        })
    }

    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism().unwrap_or(NonZeroUsize::MIN)
    }

    /// Runs a batch of events on the workers and reports each one as it
    /// completes.
    async fn run_batch(
        &self,
        sender: &ReportSender,
        events: Vec<SinkEvent>,
    ) -> Result<(), SinkError> {
        let mut pending = FuturesUnordered::new();

        for event in events {
            let path = event.path().clone();
            let host = Arc::clone(&self.host);
            let receiver = self
                .dispatcher
                .dispatch(move || async move { apply(host.as_ref(), event) })
                .map_err(|error| {
                    sender.fail(SinkError::Dispatch {
                        path: path.clone(),
                        message: error.to_string(),
                    })
                })?;
            pending.push(async move { (path, receiver.await) });
        }

        while let Some((path, result)) = pending.next().await {
            let event = match result {
                Ok(Ok(event)) => event,
                Ok(Err(source)) => {
                    debug!("Write of '{}' failed: {}", source.path(), source);
                    return Err(sender.fail(SinkError::Host { source }));
                }
                Err(source) => {
                    debug!("Write of '{}' was canceled: {}", path, source);
                    return Err(sender.fail(SinkError::Canceled { path, source }));
                }
            };
            info!("Applied {} of '{}'", event.kind(), event.path());
            sender.send(Ok(event));
        }
        Ok(())
    }
}

/// Performs one event on the host and returns it for reporting. Updates
/// whose content is already in place are reported without being written.
fn apply(host: &dyn Host, event: SinkEvent) -> Result<SinkEvent, HostError> {
    match &event {
        SinkEvent::Create { path, content } => host.write(path, content.clone())?,
        SinkEvent::Update { path, content } => {
            if host.read(path).is_ok_and(|current| current == *content) {
                debug!("Content of '{}' is unchanged, skipping write", path);
            } else {
                host.write(path, content.clone())?;
            }
        }
        SinkEvent::Delete { path } => host.delete(path)?,
        SinkEvent::Rename { from, to } => host.rename(from, to)?,
        // Conflicts stop the commit during planning.
        SinkEvent::Error { .. } => {}
    }
    Ok(event)
}

impl Sink for HostSink {
    fn reporter(&mut self) -> Option<Reporter> {
        self.channel.reporter()
    }

    async fn commit(&mut self, tree: HostTree) -> Result<(), SinkError> {
        let sender = self.channel.open()?;
        warn_open_updates(&tree);

        let plan = Plan::build(self.host.as_ref(), tree.actions(), self.options.strict);
        if let Some(conflict) = plan.first_conflict() {
            info!("Commit of tree {} aborted: {}", tree.id(), conflict);
            return Err(sender.fail(conflict));
        }

        let events = plan.events();
        let total = events.len();
        let phase = |kind: EventKind| -> Vec<SinkEvent> {
            events
                .iter()
                .filter(|event| event.kind() == kind)
                .cloned()
                .collect()
        };

        self.run_batch(&sender, phase(EventKind::Delete)).await?;
        for rename in phase(EventKind::Rename) {
            self.run_batch(&sender, vec![rename]).await?;
        }
        self.run_batch(&sender, phase(EventKind::Create)).await?;
        self.run_batch(&sender, phase(EventKind::Update)).await?;

        info!("Committed tree {}: {} actions applied", tree.id(), total);
        Ok(())
    }
}
