//! File handles selected for upload.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::io::ReaderStream;

use crate::{Result, VaultError};

/// Where the bytes of an upload come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An in-memory buffer.
    Memory(Bytes),
}

/// A file handle: name, byte size and a readable source.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    source: FileSource,
}

impl UploadFile {
    /// Create a handle for a local file, reading its size from metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(VaultError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                VaultError::Validation(format!("{} has no file name", path.display()))
            })?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Create a handle for an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Open the file as a stream of chunks of at most `chunk_size` bytes.
    pub async fn stream(&self, chunk_size: usize) -> Result<BoxStream<'static, io::Result<Bytes>>> {
        let chunk_size = chunk_size.max(1);
        match &self.source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(ReaderStream::with_capacity(file, chunk_size).boxed())
            }
            FileSource::Memory(data) => {
                let data = data.clone();
                let chunks: Vec<io::Result<Bytes>> = (0..data.len())
                    .step_by(chunk_size)
                    .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
        }
    }
}
