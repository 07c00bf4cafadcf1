//! Composition root wiring queue, tracker and scheduler together.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{DriveApi, HttpDriveClient};
use crate::config::{Config, UploadConfig};
use crate::event::ItemId;
use crate::queue::TaskQueue;
use crate::scheduler::UploadScheduler;
use crate::tracker::{TransferTracker, UploadItem};
use crate::transfer::{HttpTransport, ObjectTransport};
use crate::tree::{SelectedFile, UploadTree};
use crate::{Result, VaultError};

/// Entry point for front ends: start uploads, cancel them, observe them.
///
/// One uploader owns one queue, so every batch started through it shares the
/// same concurrency ceiling.
pub struct Uploader<A = HttpDriveClient, T = HttpTransport> {
    tracker: TransferTracker,
    scheduler: UploadScheduler<A, T>,
    schedules: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl Uploader<HttpDriveClient, HttpTransport> {
    /// Build an uploader talking HTTP as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = HttpDriveClient::new(&config.api)?;
        let transport = HttpTransport::new(config.upload.chunk_size())?;
        Ok(Self::new(api, transport, &config.upload))
    }
}

impl<A, T> Uploader<A, T>
where
    A: DriveApi,
    T: ObjectTransport,
{
    pub fn new(api: A, transport: T, config: &UploadConfig) -> Self {
        let tracker = TransferTracker::new();
        let scheduler = UploadScheduler::new(
            Arc::new(api),
            Arc::new(transport),
            TaskQueue::new(config.concurrency),
            Arc::new(tracker.clone()),
        )
        .with_transfer_timeout(config.transfer_timeout());

        Self {
            tracker,
            scheduler,
            schedules: Mutex::new(Vec::new()),
        }
    }

    pub fn tracker(&self) -> &TransferTracker {
        &self.tracker
    }

    /// Start uploading `files` into `folder_id` (`None` = drive root).
    ///
    /// Items are tracked as pending right away; scheduling runs in the
    /// background. Returns the new item ids in selection order.
    pub fn upload(&self, files: Vec<SelectedFile>, folder_id: Option<String>) -> Vec<ItemId> {
        if files.is_empty() {
            return Vec::new();
        }

        let entries: Vec<(ItemId, SelectedFile)> =
            files.into_iter().map(|file| (ItemId::new(), file)).collect();
        let ids: Vec<ItemId> = entries.iter().map(|(id, _)| *id).collect();

        self.tracker.add(entries.iter().map(|(id, selected)| {
            UploadItem::pending(
                *id,
                selected.file.name(),
                selected.file.size(),
                folder_id.clone(),
            )
        }));

        let tree = Arc::new(UploadTree::reconstruct(entries, folder_id));
        info!(
            files = tree.file_count(),
            folders = tree.folder_count(),
            "Upload started"
        );

        let scheduler = self.scheduler.clone();
        let handle = tokio::spawn(async move {
            let result = scheduler.schedule(tree).await;
            if let Err(e) = &result {
                warn!(error = %e, "Upload finished with folder errors");
            }
            result
        });
        self.schedules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);

        ids
    }

    /// Abort one item's in-flight transfer. See [`TransferTracker::cancel`].
    pub fn cancel(&self, id: ItemId) -> Result<bool> {
        self.tracker.cancel(id)
    }

    /// Abort every active transfer and forget all items.
    pub fn clear(&self) -> usize {
        self.tracker.clear()
    }

    /// Wait for every batch started so far to finish scheduling.
    ///
    /// Returns the first folder-creation error any batch reported.
    pub async fn wait_idle(&self) -> Result<()> {
        let handles: Vec<_> = std::mem::take(
            &mut *self
                .schedules
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut first_error = None;
        for handle in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(VaultError::Io(std::io::Error::other(e))));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        self.scheduler.queue().wait_idle().await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UploadStatus;
    use crate::file::UploadFile;
    use crate::transfer::ProgressReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingApi {
        folders: AtomicUsize,
    }

    impl DriveApi for CountingApi {
        async fn create_folder(&self, name: &str, _parent_id: Option<&str>) -> Result<String> {
            let n = self.folders.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{name}-{n}"))
        }

        async fn request_upload_url(
            &self,
            name: &str,
            _size: u64,
            _folder_id: Option<&str>,
        ) -> Result<String> {
            Ok(format!("https://objects.test/{name}"))
        }
    }

    /// Completes files immediately unless their name starts with "slow".
    struct NameTransport;

    impl ObjectTransport for NameTransport {
        async fn put(&self, url: &str, file: &UploadFile, progress: ProgressReporter) -> Result<u16> {
            if url.contains("/slow") {
                std::future::pending::<()>().await;
            }
            progress.advance(file.size());
            Ok(200)
        }
    }

    fn uploader(concurrency: usize) -> Uploader<CountingApi, NameTransport> {
        let config = UploadConfig {
            concurrency,
            ..Default::default()
        };
        Uploader::new(
            CountingApi {
                folders: AtomicUsize::new(0),
            },
            NameTransport,
            &config,
        )
    }

    fn selected(path: &str) -> SelectedFile {
        let name = path.rsplit('/').next().unwrap_or(path);
        SelectedFile::with_path(UploadFile::from_bytes(name, vec![1u8; 16]), path)
    }

    #[tokio::test]
    async fn test_upload_tracks_pending_items() {
        let uploader = uploader(2);
        let ids = uploader.upload(vec![selected("a.txt"), selected("dir/b.txt")], Some("dest".into()));

        assert_eq!(ids.len(), 2);
        let items = uploader.tracker().snapshot();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, ids[0]);
        assert_eq!(items[0].folder_id.as_deref(), Some("dest"));

        uploader.wait_idle().await.unwrap();
        assert_eq!(uploader.tracker().summary().done, 2);
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let uploader = uploader(2);
        assert!(uploader.upload(Vec::new(), None).is_empty());
        uploader.wait_idle().await.unwrap();
        assert!(uploader.tracker().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_batches_share_tracker() {
        let uploader = uploader(3);
        uploader.upload(vec![selected("one.txt")], None);
        uploader.upload(vec![selected("x/two.txt"), selected("x/three.txt")], None);

        uploader.wait_idle().await.unwrap();
        let summary = uploader.tracker().summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.done, 3);
    }

    #[tokio::test]
    async fn test_cancel_single_item() {
        let uploader = uploader(3);
        let ids = uploader.upload(vec![selected("slow.bin"), selected("fast.bin")], None);

        let mut rx = uploader.tracker().subscribe();
        rx.wait_for(|items| {
            items.iter().any(|i| i.name == "slow.bin" && i.status == UploadStatus::Uploading)
        })
        .await
        .unwrap();

        assert!(uploader.cancel(ids[0]).unwrap());
        uploader.wait_idle().await.unwrap();

        assert_eq!(uploader.tracker().get(ids[0]).unwrap().status, UploadStatus::Abort);
        assert_eq!(uploader.tracker().get(ids[1]).unwrap().status, UploadStatus::Done);
    }

    #[tokio::test]
    async fn test_clear_aborts_active_transfers() {
        let uploader = uploader(2);
        uploader.upload(vec![selected("slow-1.bin"), selected("slow-2.bin")], None);

        let mut rx = uploader.tracker().subscribe();
        rx.wait_for(|items| items.iter().all(|i| i.status == UploadStatus::Uploading))
            .await
            .unwrap();

        assert_eq!(uploader.clear(), 2);
        uploader.wait_idle().await.unwrap();
        assert!(uploader.tracker().snapshot().is_empty());
    }
}
