/// Disk-based file storage backend
use crate::{
    error::{AppError, AppResult},
    storage::FileBackend,
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Stores files under a root directory, keyed by relative path
/// such as `photos/<id>.jpg`.
#[derive(Clone)]
pub struct DiskFileBackend {
    base_path: PathBuf,
}

impl DiskFileBackend {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a key to a path under the root. Absolute keys and `..`
    /// segments are rejected.
    fn file_path(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(AppError::BadRequest(format!("Invalid storage key: {}", key)));
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl FileBackend for DiskFileBackend {
    async fn put(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let path = self.file_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.file_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.file_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}
