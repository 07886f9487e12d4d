use crate::{error_code::ErrorCode, file::File, formats::ThumbnailFormat, store::Store};
use actix_web::web::Bytes;
use futures_util::stream::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use url::Url;

use super::StoreError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed to read or write file")]
    Io(#[from] std::io::Error),

    #[error("Tried to save over existing file")]
    FileExists,

    #[error("Key {0} does not name a file in the store")]
    InvalidKey(String),
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::FileExists => ErrorCode::FILE_EXISTS,
            Self::InvalidKey(_) => ErrorCode::NOT_FOUND,
        }
    }
}

/// Stores thumbnails as flat files under a single directory
#[derive(Clone)]
pub(crate) struct FileStore {
    root_dir: PathBuf,
    public_url: Url,
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    #[tracing::instrument(skip(stream))]
    async fn save_stream<S, E>(
        &self,
        key: &str,
        mut stream: S,
        content_type: mime::Mime,
    ) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + 'static,
        E: From<StoreError> + 'static,
    {
        if ThumbnailFormat::from_media_type(&content_type).is_none() {
            return Err(StoreError::UnsupportedMediaType(content_type).into());
        }

        let path = self.path_from_key(key).map_err(StoreError::from)?;

        safe_create_parent(&path).await.map_err(StoreError::from)?;

        if let Err(e) = tokio::fs::metadata(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(StoreError::from(FileError::from(e)).into());
            }
        } else {
            return Err(StoreError::from(FileError::FileExists).into());
        }

        let mut file = File::create(&path)
            .await
            .map_err(|e| StoreError::from(FileError::from(e)))?;

        while let Some(res) = stream.next().await {
            let written = match res {
                Ok(bytes) => file
                    .write_from_bytes(bytes)
                    .await
                    .map_err(|e| E::from(StoreError::from(FileError::from(e)))),
                Err(e) => Err(e),
            };

            if let Err(e) = written {
                // remove file if writing failed before completion
                drop(file);
                self.safe_remove_file(&path).await;
                return Err(e);
            }
        }

        if let Err(e) = file.close().await {
            self.safe_remove_file(&path).await;
            return Err(StoreError::from(FileError::from(e)).into());
        }

        Ok(())
    }

    #[tracing::instrument]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_from_key(key)?;

        tokio::fs::remove_file(path).await.map_err(FileError::from)?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        super::join_url(&self.public_url, key)
    }
}

impl FileStore {
    #[tracing::instrument]
    pub(crate) async fn build(root_dir: PathBuf, public_url: Url) -> color_eyre::Result<Self> {
        tokio::fs::create_dir_all(&root_dir).await?;

        Ok(FileStore {
            root_dir,
            public_url,
        })
    }

    /// Open a stored file for streaming back to a client
    #[tracing::instrument]
    pub(crate) async fn to_stream(
        &self,
        key: &str,
    ) -> Result<ReaderStream<tokio::fs::File>, StoreError> {
        let path = self.path_from_key(key)?;

        let file = File::open(path).await.map_err(FileError::from)?;

        Ok(file.read_to_stream())
    }

    /// Keys are single file names. Anything that could walk out of the root is rejected.
    fn path_from_key(&self, key: &str) -> Result<PathBuf, FileError> {
        let mut components = Path::new(key).components();

        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(name)), None) if !key.starts_with('.') => {
                Ok(self.root_dir.join(name))
            }
            _ => Err(FileError::InvalidKey(key.to_string())),
        }
    }

    async fn safe_remove_file(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove partial file {path:?}: {e}");
            }
        }
    }
}

pub(crate) async fn safe_create_parent<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
    if let Some(path) = path.as_ref().parent() {
        tokio::fs::create_dir_all(path).await?;
    }

    Ok(())
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root_dir", &self.root_dir)
            .field("public_url", &self.public_url.as_str())
            .finish()
    }
}
