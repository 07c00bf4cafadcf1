//! Turning local paths into selected files.
//!
//! A file path becomes a flat entry. A directory is walked recursively and
//! each file's relative path starts with the directory's own name, so
//! uploading `~/photos` recreates a `photos` folder remotely.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::file::UploadFile;
use crate::tree::SelectedFile;
use crate::{Result, VaultError};

/// Collect every file under `paths`, in argument order then file-name order.
pub async fn select_paths(paths: &[PathBuf]) -> Result<Vec<SelectedFile>> {
    let mut selected = Vec::new();

    for path in paths {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_file() {
            selected.push(SelectedFile::flat(UploadFile::from_path(path).await?));
            continue;
        }

        let root = path.clone();
        let entries = tokio::task::spawn_blocking(move || walk_directory(&root))
            .await
            .map_err(|e| VaultError::Io(std::io::Error::other(e)))??;
        debug!(dir = %path.display(), files = entries.len(), "Directory selected");

        for (file_path, relative_path) in entries {
            let file = UploadFile::from_path(&file_path).await?;
            selected.push(SelectedFile::with_path(file, relative_path));
        }
    }

    Ok(selected)
}

/// Walk a directory, returning `(absolute path, relative path)` for each file.
fn walk_directory(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let dir = dir.canonicalize()?;
    let prefix = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&dir) else {
            continue;
        };
        let mut segments: Vec<String> = prefix.iter().cloned().collect();
        segments.extend(relative.components().filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        }));

        files.push((entry.path().to_path_buf(), segments.join("/")));
    }

    Ok(files)
}
