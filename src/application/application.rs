use std::sync::Arc;

use futures::StreamExt;
use snafu::prelude::*;
use tracing::{debug, info};

use stagetree::host::{DiskHost, Host};
use stagetree::recorder::RecorderError;
use stagetree::sink::{DryRunSink, HostSink, Sink, SinkCreationError, SinkError, SinkOptions};
use stagetree::tree::{HostTree, TreeError};

use crate::application::{EventPrinter, RuntimeConfig};
use crate::config::{Change, Edit, EditScript, EditScriptError};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let script = EditScript::from_path(&app_config.script)
            .await
            .context(EditScriptSnafu)?;
        debug!("Loaded {} edits", script.edits().len());

        let host: Arc<dyn Host> = Arc::new(DiskHost::new(&app_config.root));
        let mut tree = HostTree::new(Arc::clone(&host));
        for (index, edit) in script.edits().iter().enumerate() {
            stage_edit(&mut tree, edit).context(StageSnafu { index })?;
        }
        info!("Staged {} actions", tree.actions().len());

        let options = SinkOptions {
            strict: app_config.strict,
            workers: app_config.workers,
        };
        if app_config.dry_run {
            Self::commit(DryRunSink::new(host, options), tree).await
        } else {
            let sink = HostSink::new(host, options).context(SinkCreationSnafu)?;
            Self::commit(sink, tree).await
        }
    }

    async fn commit(mut sink: impl Sink, tree: HostTree) -> Result<(), ApplicationError> {
        let reporter = sink.reporter();
        let result = sink.commit(tree).await;

        if let Some(mut reporter) = reporter {
            let printer = EventPrinter::for_stdout();
            while let Some(Ok(event)) = reporter.next().await {
                printer.print(&event);
            }
        }
        result.context(CommitSnafu)
    }
}

fn stage_edit(tree: &mut HostTree, edit: &Edit) -> Result<(), StageError> {
    match edit {
        Edit::Create { path, content } => tree.create(path, content.clone()).context(TreeSnafu),
        Edit::Overwrite { path, content } => {
            tree.overwrite(path, content.clone()).context(TreeSnafu)
        }
        Edit::Delete { path } => tree.delete(path).context(TreeSnafu),
        Edit::Rename { from, to } => tree.rename(from, to).context(TreeSnafu),
        Edit::Update { path, changes } => {
            let mut recorder = tree.begin_update(path).context(TreeSnafu)?;
            for change in changes {
                let recorded = match change {
                    Change::InsertLeft { position, content } => {
                        recorder.insert_left(*position, content.clone()).map(|_| ())
                    }
                    Change::InsertRight { position, content } => {
                        recorder.insert_right(*position, content.clone()).map(|_| ())
                    }
                    Change::Remove { position, length } => {
                        recorder.remove(*position, *length).map(|_| ())
                    }
                };
                if let Err(source) = recorded {
                    tree.discard_update(recorder).context(TreeSnafu)?;
                    return Err(source).context(RecorderSnafu);
                }
            }
            tree.commit_update(recorder).context(TreeSnafu)
        }
    }
}

#[derive(Debug, Snafu)]
pub enum StageError {
    #[snafu(display("The tree rejected the edit"))]
    TreeError { source: TreeError },
    #[snafu(display("The update recorder rejected a change"))]
    RecorderError { source: RecorderError },
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the edit script"))]
    EditScriptError { source: EditScriptError },
    #[snafu(display("Failed to stage edit #{}", index))]
    StageError { index: usize, source: StageError },
    #[snafu(display("Critical failure encountered during sink creation"))]
    SinkCreationError { source: SinkCreationError },
    #[snafu(display("Critical failure encountered while committing the changes"))]
    CommitError { source: SinkError },
}
