//! File-per-key storage backend.
//!
//! Each key is stored as `<percent-encoded key>.json` inside one directory.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves either the old document or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::StorageBackend;
use crate::error::Result;

const EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Directory-backed key/value store.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (and create if needed) the storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "File storage backend opened");
        Ok(Self { dir })
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", urlencoding::encode(key)))
    }
}

impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);

        fs::write(&temp, value).await?;
        fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(&format!(".{EXTENSION}")))
            else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => tracing::warn!(file = stem, error = %e, "Skipping undecodable file name"),
            }
        }

        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.write("shop:cart:user:a/b", "[]").await.unwrap();
        backend.write("shop:cart:guest", "[1]").await.unwrap();

        assert_eq!(
            backend.read("shop:cart:user:a/b").await.unwrap().as_deref(),
            Some("[]")
        );

        let mut keys = backend.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["shop:cart:guest", "shop:cart:user:a/b"]);
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        assert_eq!(backend.read("absent").await.unwrap(), None);
        assert!(!backend.remove("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileBackend::open(dir.path())
            .await
            .unwrap()
            .write("shop:wishlist:guest", "[]")
            .await
            .unwrap();

        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert!(reopened.read("shop:wishlist:guest").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_non_json_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        fs::write(dir.path().join("README"), "notes").await.unwrap();

        assert!(backend.keys().await.unwrap().is_empty());
    }
}
