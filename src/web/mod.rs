//! Web module for CloudVault.
//!
//! Serves the drive API used by the upload client and receives
//! upload-finalize callbacks from the object store.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod signature;

pub use error::ApiError;
pub use handlers::AppState;
pub use middleware::AuthUser;
pub use router::create_router;
pub use server::WebServer;
