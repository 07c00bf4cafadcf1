//! Upload scheduler: walks an [`UploadTree`] creating folders parent-first and
//! queueing file uploads.
//!
//! For each folder the scheduler
//! 1. queues every file attached directly to it,
//! 2. waits for the shared queue to drain,
//! 3. creates each child folder through the queue (siblings concurrently) and
//!    recurses into it once its id is known.
//!
//! Folder creations and uploads share one [`TaskQueue`], so the concurrency
//! ceiling covers both.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::api::DriveApi;
use crate::event::{EventSink, UploadEvent};
use crate::queue::TaskQueue;
use crate::transfer::{run_upload, FileUpload, ObjectTransport};
use crate::tree::{NodeId, UploadTree};
use crate::Result;

pub struct UploadScheduler<A, T> {
    api: Arc<A>,
    transport: Arc<T>,
    queue: TaskQueue,
    sink: Arc<dyn EventSink>,
    transfer_timeout: Option<Duration>,
}

impl<A, T> Clone for UploadScheduler<A, T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            transport: self.transport.clone(),
            queue: self.queue.clone(),
            sink: self.sink.clone(),
            transfer_timeout: self.transfer_timeout,
        }
    }
}

impl<A, T> UploadScheduler<A, T>
where
    A: DriveApi,
    T: ObjectTransport,
{
    pub fn new(api: Arc<A>, transport: Arc<T>, queue: TaskQueue, sink: Arc<dyn EventSink>) -> Self {
        Self {
            api,
            transport,
            queue,
            sink,
            transfer_timeout: None,
        }
    }

    /// Fail transfers that take longer than `timeout`.
    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Upload a whole tree.
    ///
    /// Resolves once every file has reached a terminal status. File failures
    /// are reported as events only. If a folder cannot be created, every file
    /// beneath it is reported failed, the remaining branches carry on, and the
    /// first such error is returned once everything has settled.
    pub async fn schedule(&self, tree: Arc<UploadTree>) -> Result<()> {
        if tree.is_empty() {
            debug!("Nothing to upload");
            return Ok(());
        }

        debug!(
            files = tree.file_count(),
            folders = tree.folder_count(),
            "Scheduling upload tree"
        );
        let root = tree.root();
        self.schedule_folder(tree, root).await
    }

    fn schedule_folder(&self, tree: Arc<UploadTree>, id: NodeId) -> BoxFuture<'_, Result<()>> {
        async move {
            let node = tree.node(id);
            let folder_id = node.remote_id().map(str::to_string);

            for file in node.files() {
                self.enqueue_upload(FileUpload {
                    id: file.id,
                    file: file.file.clone(),
                    folder_id: folder_id.clone(),
                });
            }

            self.queue.wait_idle().await;

            let branches: Vec<_> = node
                .children()
                .iter()
                .map(|&child| self.create_and_descend(tree.clone(), child, folder_id.clone()))
                .collect();
            let results = join_all(branches).await;

            match results.into_iter().find_map(|result| result.err()) {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        .boxed()
    }

    async fn create_and_descend(
        &self,
        tree: Arc<UploadTree>,
        child: NodeId,
        parent_id: Option<String>,
    ) -> Result<()> {
        let name = tree.node(child).name().unwrap_or_default().to_string();
        let api = self.api.clone();
        let created = self
            .queue
            .enqueue(async move { api.create_folder(&name, parent_id.as_deref()).await })
            .await;

        match created {
            Ok(remote_id) => {
                debug!(folder = %tree.path(child), %remote_id, "Folder created");
                tree.set_remote_id(child, remote_id);
                self.schedule_folder(tree, child).await
            }
            Err(e) => {
                let files = tree.files_in_subtree(child);
                warn!(
                    folder = %tree.path(child),
                    error = %e,
                    affected = files.len(),
                    "Folder creation failed"
                );
                for file in files {
                    self.sink.emit(
                        file.id,
                        UploadEvent::Failed(format!("folder creation failed: {e}")),
                    );
                }
                Err(e)
            }
        }
    }

    fn enqueue_upload(&self, upload: FileUpload) {
        let api = self.api.clone();
        let transport = self.transport.clone();
        let sink = self.sink.clone();
        let timeout = self.transfer_timeout;

        // Outcomes are reported as events, the handle carries nothing.
        drop(self.queue.enqueue(async move {
            run_upload(api.as_ref(), transport.as_ref(), upload, sink, timeout).await;
            Ok(())
        }));
    }
}
