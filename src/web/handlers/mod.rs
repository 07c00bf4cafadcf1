//! API handlers for the drive server.

pub mod drive;
pub mod webhook;

pub use drive::*;
pub use webhook::*;

use crate::config::ServerConfig;
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// HMAC key shared with the object store.
    pub webhook_secret: String,
    /// Base of the upload URLs handed to clients.
    pub object_base_url: String,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, config: &ServerConfig) -> Self {
        Self {
            db,
            webhook_secret: config.webhook_secret.clone(),
            object_base_url: config.object_base_url.clone(),
        }
    }

    /// Upload URL for an object key.
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.object_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}
