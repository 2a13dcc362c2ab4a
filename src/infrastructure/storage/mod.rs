use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

pub mod s3;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage is not configured: {0}")]
    Config(String),
    #[error("failed to download {key}: {message}")]
    Download { key: String, message: String },
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
    #[error("local file error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("transfer cancelled")]
    Cancelled,
}

impl StorageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Object store holding sources and HLS output.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetches `key` into `dest`, creating parent directories. Returns the
    /// number of bytes written.
    async fn download(
        &self,
        key: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, StorageError>;

    async fn upload(
        &self,
        src: &Path,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError>;
}

/// Builds a storage client. Called once per job so that a misconfigured
/// store fails that job rather than the process.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ObjectStorage>, StorageError>;
}

/// Uploads every file below `dir` to `prefix/<relative path>`, one file at a
/// time in file-name order, stopping at the first failure or cancellation.
pub async fn upload_directory(
    storage: &dyn ObjectStorage,
    dir: &Path,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<usize, StorageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let prefix = prefix.trim_end_matches('/');
    for path in &files {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        let key = object_key(prefix, dir, path);
        storage.upload(path, &key, cancel).await?;
    }

    debug!(dir = %dir.display(), prefix, count = files.len(), "Directory uploaded");
    Ok(files.len())
}

fn object_key(prefix: &str, root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", prefix, rel.join("/"))
}

pub fn content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/MP2T".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
