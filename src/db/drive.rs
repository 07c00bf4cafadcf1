//! Drive repository: folders, files, storage usage and pending uploads.

use uuid::Uuid;

use super::DbPool;
use crate::{Result, VaultError};

/// Maximum folder name length in characters.
pub const MAX_FOLDER_NAME_LENGTH: usize = 128;

/// Largest single upload the server authorizes (1 GiB).
pub const MAX_UPLOAD_SIZE: i64 = 1_073_741_824;

/// Ids of `folder_id` and all its ancestors owned by `user_id`, with depth
/// 0 for the folder itself.
const FOLDER_CHAIN_CTE: &str = "WITH RECURSIVE chain(id, parent_id, depth) AS (
        SELECT id, parent_id, 0 FROM folders WHERE id = ? AND user_id = ?
        UNION ALL
        SELECT f.id, f.parent_id, chain.depth + 1
        FROM folders f JOIN chain ON f.id = chain.parent_id
    )";

/// A folder in a user's drive.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Folder {
    pub id: String,
    pub name: String,
    /// Total bytes of all files beneath this folder.
    pub size: i64,
    /// Parent folder ID (None for folders at the drive root).
    pub parent_id: Option<String>,
    pub user_id: String,
    pub created_at: String,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub parent_id: Option<String>,
    pub user_id: String,
}

impl NewFolder {
    /// Create a folder at the drive root.
    pub fn new(name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            user_id: user_id.into(),
        }
    }

    /// Place the folder under a parent.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A file whose upload was confirmed.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FileRecord {
    pub id: String,
    pub key: String,
    pub name: String,
    pub size: i64,
    pub folder_id: Option<String>,
    pub user_id: String,
    pub created_at: String,
}

/// An upload that was authorized but not yet confirmed by the object store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PendingUpload {
    /// Object key: folder id chain from the root, then the file id.
    pub key: String,
    pub file_id: String,
    pub name: String,
    /// Declared size.
    pub size: i64,
    pub folder_id: Option<String>,
    pub user_id: String,
    pub created_at: String,
}

/// Data for authorizing a new upload.
#[derive(Debug, Clone)]
pub struct NewPendingUpload {
    pub name: String,
    pub size: i64,
    pub folder_id: Option<String>,
    pub user_id: String,
}

/// Storage usage of a user.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Storage {
    pub user_id: String,
    pub total_storage: i64,
    pub used_storage: i64,
}

impl Storage {
    /// Bytes still available.
    pub fn available(&self) -> i64 {
        (self.total_storage - self.used_storage).max(0)
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Repository for drive contents.
pub struct DriveRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> DriveRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a folder.
    ///
    /// The name must be 1 to 128 characters after trimming, and the parent (if
    /// any) must be a folder of the same user.
    pub async fn create_folder(&self, new_folder: &NewFolder) -> Result<Folder> {
        let name = new_folder.name.trim();
        let length = name.chars().count();
        if length == 0 || length > MAX_FOLDER_NAME_LENGTH {
            return Err(VaultError::Validation(format!(
                "folder name must be 1 to {MAX_FOLDER_NAME_LENGTH} characters"
            )));
        }

        if let Some(parent_id) = &new_folder.parent_id {
            let parent = self.get_folder(parent_id).await?;
            if parent.map_or(true, |p| p.user_id != new_folder.user_id) {
                return Err(VaultError::NotFound("parent folder".into()));
            }
        }

        let id = new_id();
        sqlx::query("INSERT INTO folders (id, name, parent_id, user_id) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(&new_folder.parent_id)
            .bind(&new_folder.user_id)
            .execute(self.pool)
            .await?;

        self.get_folder(&id)
            .await?
            .ok_or_else(|| VaultError::NotFound("folder".into()))
    }

    /// Get a folder by ID.
    pub async fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, size, parent_id, user_id, created_at FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(folder)
    }

    /// Ids from the drive root down to `folder_id`, inclusive.
    ///
    /// Empty when the folder does not exist for this user.
    pub async fn folder_chain(&self, folder_id: &str, user_id: &str) -> Result<Vec<String>> {
        let sql = format!("{FOLDER_CHAIN_CTE} SELECT id FROM chain ORDER BY depth DESC");
        let ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(folder_id)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// Get a user's storage usage.
    pub async fn get_storage(&self, user_id: &str) -> Result<Option<Storage>> {
        let storage = sqlx::query_as::<_, Storage>(
            "SELECT user_id, total_storage, used_storage FROM storage WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(storage)
    }

    /// Authorize an upload and remember it until the object store confirms it.
    ///
    /// Rejects sizes outside 1 byte..1 GiB, uploads exceeding the user's free
    /// storage, and unknown target folders.
    pub async fn register_pending_upload(&self, upload: &NewPendingUpload) -> Result<PendingUpload> {
        if upload.name.trim().is_empty() {
            return Err(VaultError::Validation("file name must not be empty".into()));
        }
        if upload.size < 1 || upload.size > MAX_UPLOAD_SIZE {
            return Err(VaultError::Validation(format!(
                "file size must be between 1 and {MAX_UPLOAD_SIZE} bytes"
            )));
        }

        if let Some(storage) = self.get_storage(&upload.user_id).await? {
            if storage.available() < upload.size {
                return Err(VaultError::Validation("storage quota exceeded".into()));
            }
        }

        let chain = match &upload.folder_id {
            Some(folder_id) => {
                let chain = self.folder_chain(folder_id, &upload.user_id).await?;
                if chain.is_empty() {
                    return Err(VaultError::NotFound("folder".into()));
                }
                chain
            }
            None => Vec::new(),
        };

        let file_id = new_id();
        let key = if chain.is_empty() {
            format!("/{file_id}")
        } else {
            format!("{}/{file_id}", chain.join("/"))
        };

        sqlx::query(
            "INSERT INTO pending_uploads (key, file_id, name, size, folder_id, user_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&key)
        .bind(&file_id)
        .bind(&upload.name)
        .bind(upload.size)
        .bind(&upload.folder_id)
        .bind(&upload.user_id)
        .execute(self.pool)
        .await?;

        self.get_pending_upload(&key)
            .await?
            .ok_or_else(|| VaultError::NotFound("pending upload".into()))
    }

    /// Get a pending upload by object key.
    pub async fn get_pending_upload(&self, key: &str) -> Result<Option<PendingUpload>> {
        let pending = sqlx::query_as::<_, PendingUpload>(
            "SELECT key, file_id, name, size, folder_id, user_id, created_at
             FROM pending_uploads WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;
        Ok(pending)
    }

    /// Record a confirmed upload.
    ///
    /// In one transaction: inserts the file, adds `size` to the target folder
    /// and every ancestor, adds `size` to the user's used storage (creating the
    /// row if needed) and deletes the pending record. `size` is the size the
    /// object store reports, not the declared one.
    pub async fn finalize_upload(&self, key: &str, size: i64) -> Result<FileRecord> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query_as::<_, PendingUpload>(
            "SELECT key, file_id, name, size, folder_id, user_id, created_at
             FROM pending_uploads WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| VaultError::NotFound("pending upload".into()))?;

        sqlx::query(
            "INSERT INTO files (id, key, name, size, folder_id, user_id) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&pending.file_id)
        .bind(&pending.key)
        .bind(&pending.name)
        .bind(size)
        .bind(&pending.folder_id)
        .bind(&pending.user_id)
        .execute(&mut *tx)
        .await?;

        if let Some(folder_id) = &pending.folder_id {
            let sql = format!(
                "{FOLDER_CHAIN_CTE}
                 UPDATE folders SET size = size + ?, updated_at = datetime('now')
                 WHERE user_id = ? AND id IN (SELECT id FROM chain)"
            );
            sqlx::query(&sql)
                .bind(folder_id)
                .bind(&pending.user_id)
                .bind(size)
                .bind(&pending.user_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO storage (user_id, used_storage) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                used_storage = used_storage + excluded.used_storage,
                updated_at = datetime('now')",
        )
        .bind(&pending.user_id)
        .bind(size)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_uploads WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        let file = sqlx::query_as::<_, FileRecord>(
            "SELECT id, key, name, size, folder_id, user_id, created_at FROM files WHERE id = ?",
        )
        .bind(&pending.file_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(file)
    }

    /// Issue a bearer session token for a user.
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(VaultError::Validation("user id must not be empty".into()));
        }

        let token = format!("{}{}", new_id(), new_id());
        sqlx::query("INSERT INTO sessions (token, user_id) VALUES (?, ?)")
            .bind(&token)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(token)
    }

    /// Resolve a session token to its user id.
    pub async fn session_user(&self, token: &str) -> Result<Option<String>> {
        let user_id = sqlx::query_scalar::<_, String>("SELECT user_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(self.pool)
            .await?;
        Ok(user_id)
    }

    /// Get a file by object key.
    pub async fn get_file_by_key(&self, key: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(
            "SELECT id, key, name, size, folder_id, user_id, created_at FROM files WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;
        Ok(file)
    }
}
