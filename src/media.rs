//! File storage for sock images.
//!
//! All disk access goes through `spawn_blocking` so image I/O never stalls
//! the runtime threads doing embedding or search work.

use std::path::{Path, PathBuf};

use crate::error::ServiceError;
use crate::types::ImageRef;

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open (and create if needed) the media directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(ServiceError::media)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, image: &ImageRef) -> PathBuf {
        self.root.join(image.as_str())
    }

    /// Write image bytes under `file_name` and return the reference.
    pub async fn save(&self, file_name: &str, bytes: Vec<u8>) -> Result<ImageRef, ServiceError> {
        let image = ImageRef::new(file_name);
        let path = self.path_of(&image);
        tokio::task::spawn_blocking(move || std::fs::write(path, bytes))
            .await
            .map_err(ServiceError::media)?
            .map_err(ServiceError::media)?;
        Ok(image)
    }

    pub async fn load(&self, image: &ImageRef) -> Result<Vec<u8>, ServiceError> {
        let path = self.path_of(image);
        tokio::task::spawn_blocking(move || std::fs::read(path))
            .await
            .map_err(ServiceError::media)?
            .map_err(ServiceError::media)
    }

    /// Delete an image file. Deleting a missing file is a no-op.
    pub async fn delete(&self, image: &ImageRef) -> Result<(), ServiceError> {
        let path = self.path_of(image);
        let result = tokio::task::spawn_blocking(move || std::fs::remove_file(path))
            .await
            .map_err(ServiceError::media)?;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ServiceError::media(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_load_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::new(dir.path()).unwrap();

        let image = media.save("sock.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(media.load(&image).await.unwrap(), vec![1, 2, 3]);

        media.delete(&image).await.unwrap();
        assert!(media.load(&image).await.is_err());
    }

    #[tokio::test]
    async fn deleting_a_missing_file_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::new(dir.path()).unwrap();
        media.delete(&ImageRef::new("absent.png")).await.unwrap();
    }

    #[test]
    fn creates_the_root_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/media");
        let media = MediaStore::new(&nested).unwrap();
        assert!(media.root().is_dir());
    }
}
