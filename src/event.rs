//! Upload item identity, lifecycle states and the events that drive them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Client-generated identifier of an upload item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an upload item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Selected, not yet transferring.
    Pending,
    /// Transfer in progress.
    Uploading,
    /// Transfer finished with a success status.
    Done,
    /// URL issuance, folder creation or transfer failed.
    Error,
    /// Cancelled by the user.
    Abort,
}

impl UploadStatus {
    /// Check whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Abort)
    }

    /// Get the status as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Error => "error",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle that aborts one in-flight transfer.
///
/// Cloning shares the underlying token; cancelling any clone aborts the transfer.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }
}

/// Lifecycle event reported for one upload item.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The transfer began; the handle aborts it.
    Started { cancel: CancelHandle },
    /// Percent of bytes sent, in [0, 100].
    Progress(f64),
    /// The object store accepted the bytes.
    Done,
    /// The user cancelled the transfer.
    Aborted,
    /// The upload failed with the given reason.
    Failed(String),
}

/// An event addressed to a specific item.
#[derive(Debug, Clone)]
pub struct ItemEvent {
    pub id: ItemId,
    pub event: UploadEvent,
}

/// Receiver of item lifecycle events.
///
/// `emit` must not block; sinks apply events synchronously or hand them off.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, id: ItemId, event: UploadEvent);
}

impl EventSink for mpsc::UnboundedSender<ItemEvent> {
    fn emit(&self, id: ItemId, event: UploadEvent) {
        // A closed receiver means nobody observes the items any more.
        let _ = self.send(ItemEvent { id, event });
    }
}
