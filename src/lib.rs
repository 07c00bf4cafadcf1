//! CloudVault - batch upload client for a personal cloud drive
//!
//! A hierarchical, concurrency-bounded, cancellable upload scheduler plus the
//! drive server that authorizes uploads and records finished ones.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod file;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod selection;
pub mod tracker;
pub mod transfer;
pub mod tree;
pub mod uploader;
pub mod web;

pub use api::{DriveApi, HttpDriveClient};
pub use config::Config;
pub use db::{Database, DriveRepository, FileRecord, Folder, NewFolder, PendingUpload, Storage};
pub use error::{Result, VaultError};
pub use event::{CancelHandle, EventSink, ItemEvent, ItemId, UploadEvent, UploadStatus};
pub use file::{FileSource, UploadFile};
pub use queue::{TaskHandle, TaskQueue};
pub use scheduler::UploadScheduler;
pub use selection::select_paths;
pub use tracker::{TrackerSummary, TransferTracker, UploadItem};
pub use transfer::{FileUpload, HttpTransport, ObjectTransport, ProgressReporter};
pub use tree::{FileNode, FolderNode, NodeId, SelectedFile, UploadTree};
pub use uploader::Uploader;
pub use web::{AppState, WebServer};
