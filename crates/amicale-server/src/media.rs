//! Filesystem storage for uploaded media (profile photos, covers).
//!
//! Files are stored flat under one directory with a generated UUID name and
//! the sanitized extension of the original upload, and served back under
//! `/media/{file}`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Extension characters accepted back into the stored filename.
fn sanitized_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Store an upload; returns the URL path it is served under.
    pub async fn store(&self, file_name: &str, data: &[u8]) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::MediaTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let stored_name = match sanitized_extension(file_name) {
            Some(ext) => format!("{id}.{ext}"),
            None => id.to_string(),
        };
        let path = self.safe_path(&stored_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to write media {stored_name}: {e}"))
        })?;

        debug!(file = %stored_name, size = data.len(), "Stored media");
        Ok(format!("/media/{stored_name}"))
    }

    /// Read a stored file back by its stored name.
    pub async fn open(&self, stored_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(stored_name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("Media {stored_name}")));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to read media {stored_name}: {e}"))
        })?;
        Ok(data)
    }

    /// Resolve a stored name inside the base directory, rejecting anything
    /// that could escape it.
    fn safe_path(&self, stored_name: &str) -> Result<PathBuf, ServerError> {
        if stored_name.is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        Ok(self.base_path.join(stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_open() {
        let (store, _dir) = test_store().await;

        let url = store.store("photo.JPG", b"fake-jpeg-bytes").await.unwrap();
        let stored_name = url.strip_prefix("/media/").unwrap();
        assert!(stored_name.ends_with(".jpg"));

        let data = store.open(stored_name).await.unwrap();
        assert_eq!(data, b"fake-jpeg-bytes");
    }

    #[tokio::test]
    async fn test_weird_extension_dropped() {
        let (store, _dir) = test_store().await;
        let url = store.store("../../etc/passwd", b"x").await.unwrap();
        let stored_name = url.strip_prefix("/media/").unwrap();
        assert!(!stored_name.contains('.'));
        assert!(!stored_name.contains('/'));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let (store, _dir) = test_store().await;
        let oversized = vec![0u8; 2048];
        assert!(matches!(
            store.store("big.png", &oversized).await,
            Err(ServerError::MediaTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.store("empty.png", b"").await.is_err());
    }

    #[tokio::test]
    async fn test_traversal_rejected_on_open() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.open("../secret").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.open("nope.png").await,
            Err(ServerError::NotFound(_))
        ));
    }
}
