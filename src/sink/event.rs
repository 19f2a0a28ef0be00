use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use derive_more::Display;
use futures::{Stream, StreamExt};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use snafu::OptionExt;
use tracing::debug;

use super::{AlreadyCommittedSnafu, SinkError};
use crate::path::TreePath;

/// Why a planned action cannot be carried out on the output host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConflictKind {
    #[display("alreadyExist")]
    AlreadyExist,
    #[display("doesNotExist")]
    DoesNotExist,
}

/// One file-level outcome of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Create { path: TreePath, content: Bytes },
    Update { path: TreePath, content: Bytes },
    Delete { path: TreePath },
    Rename { from: TreePath, to: TreePath },
    Error { path: TreePath, description: ConflictKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EventKind {
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
    #[display("rename")]
    Rename,
    #[display("error")]
    Error,
}

impl SinkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SinkEvent::Create { .. } => EventKind::Create,
            SinkEvent::Update { .. } => EventKind::Update,
            SinkEvent::Delete { .. } => EventKind::Delete,
            SinkEvent::Rename { .. } => EventKind::Rename,
            SinkEvent::Error { .. } => EventKind::Error,
        }
    }

    /// The path the event is about; the source for a rename.
    pub fn path(&self) -> &TreePath {
        match self {
            SinkEvent::Create { path, .. }
            | SinkEvent::Update { path, .. }
            | SinkEvent::Delete { path }
            | SinkEvent::Error { path, .. } => path,
            SinkEvent::Rename { from, .. } => from,
        }
    }

    pub fn content(&self) -> Option<&Bytes> {
        match self {
            SinkEvent::Create { content, .. } | SinkEvent::Update { content, .. } => Some(content),
            _ => None,
        }
    }
}

pub type ReportItem = Result<SinkEvent, SinkError>;

/// Stream of the events a sink emits while committing.
///
/// The stream ends once the commit finished, right after the first error it
/// reports if it failed.
#[derive(Debug)]
pub struct Reporter {
    receiver: UnboundedReceiver<ReportItem>,
}

impl Reporter {
    /// Drains the stream, stopping at the first error.
    pub async fn collect_events(mut self) -> Result<Vec<SinkEvent>, SinkError> {
        let mut events = Vec::new();
        while let Some(item) = self.receiver.next().await {
            events.push(item?);
        }
        Ok(events)
    }
}

impl Stream for Reporter {
    type Item = ReportItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// Both halves of a sink's report channel, handed out at most once each.
#[derive(Debug)]
pub(super) struct ReportChannel {
    sender: Option<UnboundedSender<ReportItem>>,
    reporter: Option<Reporter>,
}

impl ReportChannel {
    pub(super) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            sender: Some(sender),
            reporter: Some(Reporter { receiver }),
        }
    }

    pub(super) fn reporter(&mut self) -> Option<Reporter> {
        self.reporter.take()
    }

    /// Claims the sending half for a commit. Dropping it ends the stream.
    pub(super) fn open(&mut self) -> Result<ReportSender, SinkError> {
        let sender = self.sender.take().context(AlreadyCommittedSnafu)?;
        Ok(ReportSender { sender })
    }
}

#[derive(Debug, Clone)]
pub(super) struct ReportSender {
    sender: UnboundedSender<ReportItem>,
}

impl ReportSender {
    pub(super) fn send(&self, item: ReportItem) {
        // The reporter may have been dropped or never taken.
        if let Err(error) = self.sender.unbounded_send(item) {
            debug!("Dropped sink report: {}", error);
        }
    }

    /// Reports a terminal error and hands it back for propagation.
    pub(super) fn fail(&self, error: SinkError) -> SinkError {
        self.send(Err(error.clone()));
        error
    }
}
