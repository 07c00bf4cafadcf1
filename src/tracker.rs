//! Transfer tracker: the authoritative list of upload items.
//!
//! Front ends observe the tracker through [`TransferTracker::subscribe`],
//! which yields a fresh snapshot after every mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::event::{CancelHandle, EventSink, ItemId, UploadEvent, UploadStatus};
use crate::{Result, VaultError};

/// One file's transfer record.
#[derive(Debug, Clone, Serialize)]
pub struct UploadItem {
    pub id: ItemId,
    pub name: String,
    pub size: u64,
    /// Target folder; `None` is the drive root.
    pub folder_id: Option<String>,
    /// Percent sent, in [0, 100].
    pub progress: f64,
    pub status: UploadStatus,
    /// Present only while the transfer is active.
    #[serde(skip)]
    pub cancel: Option<CancelHandle>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadItem {
    /// Create a pending item.
    pub fn pending(
        id: ItemId,
        name: impl Into<String>,
        size: u64,
        folder_id: Option<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            folder_id,
            progress: 0.0,
            status: UploadStatus::Pending,
            cancel: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    fn finish(&mut self, status: UploadStatus) {
        self.status = status;
        self.cancel = None;
        self.finished_at = Some(Utc::now());
    }
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerSummary {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub done: usize,
    pub error: usize,
    pub abort: usize,
}

impl TrackerSummary {
    /// Items not yet in a terminal status.
    pub fn remaining(&self) -> usize {
        self.pending + self.uploading
    }
}

struct TrackerInner {
    items: Mutex<Vec<UploadItem>>,
    snapshots: watch::Sender<Vec<UploadItem>>,
}

/// Shared, observable list of upload items.
///
/// Cloning yields another handle to the same list.
#[derive(Clone)]
pub struct TransferTracker {
    inner: Arc<TrackerInner>,
}

impl TransferTracker {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(TrackerInner {
                items: Mutex::new(Vec::new()),
                snapshots,
            }),
        }
    }

    fn items(&self) -> MutexGuard<'_, Vec<UploadItem>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, items: &[UploadItem]) {
        self.inner.snapshots.send_replace(items.to_vec());
    }

    /// Append new items after the existing ones.
    pub fn add(&self, new_items: impl IntoIterator<Item = UploadItem>) {
        let mut items = self.items();
        let before = items.len();
        items.extend(new_items);
        debug!(added = items.len() - before, "Tracking upload items");
        self.publish(&items);
    }

    /// Apply a lifecycle event to an item.
    ///
    /// Events for unknown (or removed) items and for items already in a
    /// terminal status are ignored. Progress never goes backwards.
    pub fn apply(&self, id: ItemId, event: UploadEvent) {
        let mut items = self.items();
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            debug!(%id, "Ignoring event for untracked item");
            return;
        };
        if item.status.is_terminal() {
            return;
        }

        match event {
            UploadEvent::Started { cancel } => {
                item.status = UploadStatus::Uploading;
                item.cancel = Some(cancel);
            }
            UploadEvent::Progress(percent) => {
                let percent = if percent.is_nan() {
                    0.0
                } else {
                    percent.clamp(0.0, 100.0)
                };
                if percent <= item.progress {
                    return;
                }
                item.progress = percent;
            }
            UploadEvent::Done => {
                item.progress = 100.0;
                item.finish(UploadStatus::Done);
                info!(%id, name = %item.name, size = item.size, "Upload finished");
            }
            UploadEvent::Aborted => {
                item.finish(UploadStatus::Abort);
                info!(%id, name = %item.name, "Upload aborted");
            }
            UploadEvent::Failed(reason) => {
                warn!(%id, name = %item.name, %reason, "Upload failed");
                item.error = Some(reason);
                item.finish(UploadStatus::Error);
            }
        }

        self.publish(&items);
    }

    /// Abort an item's in-flight transfer.
    ///
    /// Returns `Ok(false)` when the item has no active transfer (pending or
    /// finished); such items are left untouched.
    pub fn cancel(&self, id: ItemId) -> Result<bool> {
        let handle = {
            let items = self.items();
            let item = items
                .iter()
                .find(|item| item.id == id)
                .ok_or_else(|| VaultError::NotFound(format!("upload item {id}")))?;
            item.cancel.clone()
        };

        match handle {
            Some(handle) => {
                handle.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop tracking an item, aborting its transfer if still active.
    pub fn remove(&self, id: ItemId) -> Option<UploadItem> {
        let removed = {
            let mut items = self.items();
            let index = items.iter().position(|item| item.id == id)?;
            let removed = items.remove(index);
            self.publish(&items);
            removed
        };

        if let Some(handle) = &removed.cancel {
            handle.cancel();
        }
        Some(removed)
    }

    /// Abort every active transfer and forget all items.
    ///
    /// Returns the number of transfers that were aborted.
    pub fn clear(&self) -> usize {
        let handles: Vec<CancelHandle> = {
            let mut items = self.items();
            let handles = items.iter().filter_map(|item| item.cancel.clone()).collect();
            items.clear();
            self.publish(&items);
            handles
        };

        for handle in &handles {
            handle.cancel();
        }
        info!(aborted = handles.len(), "Cleared upload list");
        handles.len()
    }

    pub fn get(&self, id: ItemId) -> Option<UploadItem> {
        self.items().iter().find(|item| item.id == id).cloned()
    }

    /// Copy of all items in insertion order.
    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.items().clone()
    }

    /// Number of items not yet in a terminal status.
    pub fn remaining(&self) -> usize {
        self.items()
            .iter()
            .filter(|item| !item.status.is_terminal())
            .count()
    }

    /// Whether every tracked item reached a terminal status.
    pub fn is_completed(&self) -> bool {
        self.remaining() == 0
    }

    pub fn summary(&self) -> TrackerSummary {
        let items = self.items();
        let mut summary = TrackerSummary {
            total: items.len(),
            ..Default::default()
        };
        for item in items.iter() {
            match item.status {
                UploadStatus::Pending => summary.pending += 1,
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Done => summary.done += 1,
                UploadStatus::Error => summary.error += 1,
                UploadStatus::Abort => summary.abort += 1,
            }
        }
        summary
    }

    /// Subscribe to snapshots published after each mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadItem>> {
        self.inner.snapshots.subscribe()
    }
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransferTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTracker")
            .field("summary", &self.summary())
            .finish()
    }
}

impl EventSink for TransferTracker {
    fn emit(&self, id: ItemId, event: UploadEvent) {
        self.apply(id, event);
    }
}
