use actix_web::web::Bytes;
use futures_util::stream::Stream;
use std::fmt::Debug;
use url::Url;

use crate::error_code::ErrorCode;

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in file store")]
    FileStore(#[source] crate::store::file_store::FileError),

    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested file is not found")]
    FileNotFound(#[source] std::io::Error),

    #[error("Requested object is not found")]
    ObjectNotFound(#[source] crate::store::object_store::ObjectError),

    #[error("Couldn't build public url for {0}")]
    PublicUrl(String, #[source] url::ParseError),

    #[error("Store does not accept {0}")]
    UnsupportedMediaType(mime::Mime),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) => e.error_code(),
            Self::FileNotFound(_) | Self::ObjectNotFound(_) => ErrorCode::NOT_FOUND,
            Self::PublicUrl(_, _) => ErrorCode::PUBLIC_URL,
            Self::UnsupportedMediaType(_) => ErrorCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedMediaType(_))
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::ObjectNotFound(_)
                | Self::FileStore(crate::store::file_store::FileError::InvalidKey(_))
        )
    }
}

impl From<crate::store::file_store::FileError> for StoreError {
    fn from(value: crate::store::file_store::FileError) -> Self {
        match value {
            crate::store::file_store::FileError::Io(e)
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        if value.is_not_found() {
            Self::ObjectNotFound(value)
        } else {
            Self::ObjectStore(value)
        }
    }
}

/// A destination for finished uploads, addressed by caller-chosen keys
#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Write every chunk of `stream` under `key`
    ///
    /// Content types the store doesn't hold are refused before anything is written. Errors
    /// produced by the stream itself are returned untouched, and nothing is left behind under
    /// `key` when saving fails.
    async fn save_stream<S, E>(
        &self,
        key: &str,
        stream: S,
        content_type: mime::Mime,
    ) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + 'static,
        E: From<StoreError> + 'static;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn public_url(&self, key: &str) -> Result<Url, StoreError>;
}

#[async_trait::async_trait(?Send)]
impl<T> Store for actix_web::web::Data<T>
where
    T: Store,
{
    async fn health_check(&self) -> Result<(), StoreError> {
        T::health_check(self).await
    }

    async fn save_stream<S, E>(
        &self,
        key: &str,
        stream: S,
        content_type: mime::Mime,
    ) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + 'static,
        E: From<StoreError> + 'static,
    {
        T::save_stream(self, key, stream, content_type).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        T::remove(self, key).await
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        T::public_url(self, key)
    }
}

/// Join `key` onto `base`, treating `base` as a directory even without a trailing slash
pub(crate) fn join_url(base: &Url, key: &str) -> Result<Url, StoreError> {
    let mut base = base.clone();

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(key)
        .map_err(|e| StoreError::PublicUrl(key.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::join_url;
    use url::Url;

    #[test]
    fn joins_under_directory_bases() {
        let base = Url::parse("http://localhost:8091/assets/").expect("Valid url");

        let url = join_url(&base, "abc.png").expect("Joined");

        assert_eq!(url.as_str(), "http://localhost:8091/assets/abc.png");
    }

    #[test]
    fn joins_under_bases_without_trailing_slash() {
        let base = Url::parse("https://cdn.example.com/media").expect("Valid url");

        let url = join_url(&base, "landscape/abc.mp4").expect("Joined");

        assert_eq!(url.as_str(), "https://cdn.example.com/media/landscape/abc.mp4");
    }
}
