use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use fretboard_core::{ObjectStorage, ProviderError, ProviderResult, StorageConfig};
use tokio::fs;

/// Stores objects as files in a directory that the server exposes under `/media`
pub struct LocalStorage {
    directory: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            directory: PathBuf::from(&config.directory),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Keys are relative paths, anything that could escape the directory is refused
    fn path_for(&self, key: &str) -> ProviderResult<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if key.is_empty() || !safe {
            return Err(ProviderError::Request(format!("Invalid storage key: {key}")));
        }

        Ok(self.directory.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> ProviderResult<String> {
        let path = self.path_for(key)?;
        let io_error = |e: std::io::Error| ProviderError::Request(e.to_string());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        fs::write(&path, &data).await.map_err(io_error)?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> ProviderResult<()> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::Request(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{distributions::Alphanumeric, Rng};

    use super::*;

    fn storage() -> LocalStorage {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();

        LocalStorage::new(&StorageConfig {
            directory: std::env::temp_dir()
                .join(format!("fretboard-{name}"))
                .to_string_lossy()
                .to_string(),
            public_base_url: "http://localhost:9050/media/".to_string(),
        })
    }

    #[tokio::test]
    async fn writes_and_deletes_files() {
        let storage = storage();

        let url = storage
            .upload("covers/1/take.mp4", Bytes::from_static(b"data"), "video/mp4")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:9050/media/covers/1/take.mp4");

        let path = storage.directory.join("covers/1/take.mp4");
        assert_eq!(fs::read(&path).await.unwrap(), b"data");

        storage.delete("covers/1/take.mp4").await.unwrap();
        assert!(!path.exists());

        // Deleting twice is fine
        storage.delete("covers/1/take.mp4").await.unwrap();
    }

    #[tokio::test]
    async fn refuses_keys_leaving_the_directory() {
        let storage = storage();

        for key in ["../escape.mp4", "/etc/passwd", "covers/../../x", ""] {
            let result = storage.upload(key, Bytes::new(), "video/mp4").await;
            assert!(result.is_err(), "{key} was accepted");
        }
    }
}
