//! Single-file upload task: URL issuance, the PUT and its lifecycle events.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::header::CONTENT_LENGTH;
use tracing::debug;

use crate::api::DriveApi;
use crate::event::{CancelHandle, EventSink, ItemId, UploadEvent};
use crate::file::UploadFile;
use crate::{Result, VaultError};

/// A file scheduled for upload into a known folder.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub id: ItemId,
    pub file: UploadFile,
    /// Target folder; `None` is the drive root.
    pub folder_id: Option<String>,
}

/// Byte-level PUT of a file to a pre-signed URL.
pub trait ObjectTransport: Send + Sync + 'static {
    /// Send the file's bytes and return the response status code.
    ///
    /// Implementations report bytes as they go through `progress`. Transport
    /// failures are errors; any HTTP status (success or not) is returned as is.
    fn put(
        &self,
        url: &str,
        file: &UploadFile,
        progress: ProgressReporter,
    ) -> impl Future<Output = Result<u16>> + Send;
}

struct ReporterInner {
    id: ItemId,
    total: u64,
    sent: AtomicU64,
    last_percent: Mutex<f64>,
    sink: Arc<dyn EventSink>,
}

/// Turns byte counts into `Progress` events for one item.
///
/// Percentages are clamped to [0, 100] and only strictly increasing values are
/// emitted.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

impl ProgressReporter {
    pub fn new(id: ItemId, total: u64, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                id,
                total,
                sent: AtomicU64::new(0),
                last_percent: Mutex::new(0.0),
                sink,
            }),
        }
    }

    /// Record `bytes` more bytes sent.
    pub fn advance(&self, bytes: u64) {
        let sent = self.inner.sent.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let percent = if self.inner.total == 0 {
            100.0
        } else {
            (sent as f64 / self.inner.total as f64 * 100.0).min(100.0)
        };

        let mut last = self
            .inner
            .last_percent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if percent > *last {
            *last = percent;
            self.inner
                .sink
                .emit(self.inner.id, UploadEvent::Progress(percent));
        }
    }

    /// Total bytes reported so far.
    pub fn sent(&self) -> u64 {
        self.inner.sent.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("id", &self.inner.id)
            .field("total", &self.inner.total)
            .field("sent", &self.sent())
            .finish()
    }
}

/// Upload one file, reporting every lifecycle step to `sink`.
///
/// Never fails: URL issuance errors, transport errors, non-2xx statuses,
/// timeouts and cancellation all end up as events.
pub async fn run_upload<A, T>(
    api: &A,
    transport: &T,
    upload: FileUpload,
    sink: Arc<dyn EventSink>,
    timeout: Option<Duration>,
) where
    A: DriveApi,
    T: ObjectTransport,
{
    let FileUpload {
        id,
        file,
        folder_id,
    } = upload;

    let url = match api
        .request_upload_url(file.name(), file.size(), folder_id.as_deref())
        .await
    {
        Ok(url) => url,
        Err(e) => {
            sink.emit(id, UploadEvent::Failed(format!("upload URL request failed: {e}")));
            return;
        }
    };

    let cancel = CancelHandle::new();
    sink.emit(
        id,
        UploadEvent::Started {
            cancel: cancel.clone(),
        },
    );
    debug!(%id, name = file.name(), size = file.size(), "Transfer started");

    let reporter = ProgressReporter::new(id, file.size(), sink.clone());
    let put = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, transport.put(&url, &file, reporter))
                .await
                .unwrap_or_else(|_| {
                    Err(VaultError::Http(format!("transfer timed out after {limit:?}")))
                }),
            None => transport.put(&url, &file, reporter).await,
        }
    };

    let event = tokio::select! {
        biased;
        _ = cancel.cancelled() => UploadEvent::Aborted,
        result = put => match result {
            Ok(status) if (200..300).contains(&status) => UploadEvent::Done,
            Ok(status) => UploadEvent::Failed(VaultError::Status(status).to_string()),
            Err(e) => UploadEvent::Failed(e.to_string()),
        },
    };
    sink.emit(id, event);
}

/// Streams file bodies over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    chunk_size: usize,
}

impl HttpTransport {
    /// Create a transport with a default client.
    ///
    /// No overall request timeout is set; large transfers are bounded by the
    /// scheduler's optional per-transfer timeout instead.
    pub fn new(chunk_size: usize) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, chunk_size))
    }

    pub fn with_client(client: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl ObjectTransport for HttpTransport {
    async fn put(&self, url: &str, file: &UploadFile, progress: ProgressReporter) -> Result<u16> {
        let stream = file
            .stream(self.chunk_size)
            .await?
            .inspect_ok(move |chunk| progress.advance(chunk.len() as u64));

        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, file.size())
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}
