/// Upload storage for registrant photos and rendered QR images
pub mod disk;

pub use disk::DiskFileBackend;

use crate::{
    config::UploadConfig,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// File storage backend
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Write a file, replacing any existing content
    async fn put(&self, key: &str, data: &[u8]) -> AppResult<()>;

    /// Read a file, `None` if absent
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Remove a file; missing files are not an error
    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Key of a rendered QR image
pub fn qr_image_key(code_value: &str) -> String {
    format!("qrcodes/qr-{}.png", code_value)
}

/// Validates uploads and places them in the backend
#[derive(Clone)]
pub struct UploadStore {
    backend: Arc<dyn FileBackend>,
    allowed_image_types: Vec<String>,
    max_upload_size: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        let backend = Arc::new(DiskFileBackend::new(config.directory.clone()));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: &UploadConfig, backend: Arc<dyn FileBackend>) -> Self {
        Self {
            backend,
            allowed_image_types: config.allowed_image_types.clone(),
            max_upload_size: config.max_upload_size,
        }
    }

    /// Validate and store a registrant photo. Returns its storage key.
    ///
    /// The type is sniffed from the bytes; the client's declared content
    /// type is only logged.
    pub async fn store_photo(&self, data: &[u8], declared_type: Option<&str>) -> AppResult<String> {
        if data.is_empty() {
            return Err(AppError::Validation("Photo is empty".to_string()));
        }

        if data.len() > self.max_upload_size {
            return Err(AppError::Validation(format!(
                "Photo is {} bytes, maximum is {}",
                data.len(),
                self.max_upload_size
            )));
        }

        let format = image::guess_format(data)
            .map_err(|_| AppError::Validation("Photo is not a recognized image".to_string()))?;
        let mime_type = format.to_mime_type();

        if !self.allowed_image_types.iter().any(|t| t == mime_type) {
            return Err(AppError::Validation(format!(
                "Image type {} is not allowed",
                mime_type
            )));
        }

        if let Some(declared) = declared_type {
            if declared != mime_type {
                tracing::debug!(declared = %declared, detected = %mime_type, "photo content type mismatch");
            }
        }

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let key = format!("photos/{}.{}", Uuid::new_v4(), extension);

        self.backend.put(&key, data).await?;
        tracing::debug!(key = %key, size = data.len(), "photo stored");

        Ok(key)
    }

    /// Write a rendered QR image under its canonical key
    pub async fn write_qr_image(&self, code_value: &str, png: &[u8]) -> AppResult<String> {
        let key = qr_image_key(code_value);
        self.backend.put(&key, png).await?;
        Ok(key)
    }

    pub async fn read(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.backend.get(key).await
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.backend.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use tempfile::tempdir;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::new(4, 4);
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buf
    }

    fn gif_bytes() -> Vec<u8> {
        let img = image::RgbaImage::new(4, 4);
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Gif).unwrap();
        buf
    }

    fn store_in(dir: &std::path::Path) -> UploadStore {
        let config = crate::config::ServerConfig::for_tests(dir);
        UploadStore::new(&config.uploads)
    }

    #[tokio::test]
    async fn test_store_photo_png() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let key = store.store_photo(&png_bytes(), Some("image/png")).await.unwrap();
        assert!(key.starts_with("photos/"));
        assert!(key.ends_with(".png"));
        assert!(store.read(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_photo_rejects_disallowed_type() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.store_photo(&gif_bytes(), Some("image/gif")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_store_photo_rejects_non_image_and_oversize() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.store_photo(b"plain text", None).await,
            Err(AppError::Validation(_))
        ));

        let too_big = vec![0u8; 2 * 1024 * 1024];
        assert!(matches!(
            store.store_photo(&too_big, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_qr_image_key() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let key = store.write_qr_image("abc", b"png").await.unwrap();
        assert_eq!(key, "qrcodes/qr-abc.png");
        assert!(dir.path().join("qrcodes").join("qr-abc.png").exists());
    }
}
