use crate::{config::ObjectStorage, error_code::ErrorCode, formats::VideoFormat, store::Store};
use actix_web::web::Bytes;
use futures_util::stream::{Stream, StreamExt};
use object_store::{
    aws::AmazonS3Builder, path::Path, Attribute, Attributes, PutMultipartOpts, WriteMultipart,
};
use std::sync::Arc;
use url::Url;

use super::StoreError;

// buffered parts in flight before the upload waits for the bucket to catch up
const MAX_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to build object store client")]
    Build(#[source] object_store::Error),

    #[error("Invalid distribution host {0}")]
    Distribution(String, #[source] url::ParseError),

    #[error("Error making request to object store")]
    Request(#[from] object_store::Error),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(_) | Self::Distribution(_, _) => ErrorCode::OBJECT_IO_ERROR,
            Self::Request(_) => ErrorCode::OBJECT_REQUEST_ERROR,
        }
    }

    pub(super) const fn is_not_found(&self) -> bool {
        matches!(self, Self::Request(object_store::Error::NotFound { .. }))
    }
}

/// Uploads videos to a bucket fronted by a distribution host
#[derive(Clone)]
pub(crate) struct ObjectStore {
    inner: Arc<dyn object_store::ObjectStore>,
    bucket_name: String,
    public_url: Url,
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    #[tracing::instrument]
    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner
            .list_with_delimiter(None)
            .await
            .map_err(ObjectError::from)?;

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
        if VideoFormat::from_media_type(&content_type).is_none() {
            return Err(StoreError::UnsupportedMediaType(content_type).into());
        }

        let location = Path::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let upload = self
            .inner
            .put_multipart_opts(
                &location,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| StoreError::from(ObjectError::from(e)))?;

        let mut write = WriteMultipart::new(upload);

        while let Some(res) = stream.next().await {
            let bytes = match res {
                Ok(bytes) => bytes,
                Err(e) => {
                    abort(write, key).await;
                    return Err(e);
                }
            };

            if let Err(e) = write.wait_for_capacity(MAX_CONCURRENCY).await {
                abort(write, key).await;
                return Err(StoreError::from(ObjectError::from(e)).into());
            }

            write.write(&bytes);
        }

        write
            .finish()
            .await
            .map_err(|e| StoreError::from(ObjectError::from(e)))?;

        metrics::counter!("reel-rs.object-store.put", "bucket" => self.bucket_name.clone())
            .increment(1);

        Ok(())
    }

    #[tracing::instrument]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner
            .delete(&Path::from(key))
            .await
            .map_err(ObjectError::from)?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        super::join_url(&self.public_url, key)
    }
}

async fn abort(write: WriteMultipart, key: &str) {
    if let Err(e) = write.abort().await {
        tracing::warn!("Failed to abort upload of {key}: {e}");
    }
}

impl ObjectStore {
    pub(crate) fn build(config: &ObjectStorage) -> Result<Self, ObjectError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket_name)
            .with_region(&config.region)
            .with_virtual_hosted_style_request(!config.use_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str().trim_end_matches('/'))
                .with_allow_http(endpoint.scheme() == "http");
        }

        if let Some(access_key) = &config.access_key {
            builder = builder.with_access_key_id(access_key);
        }

        if let Some(secret_key) = &config.secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        if let Some(session_token) = &config.session_token {
            builder = builder.with_token(session_token);
        }

        let inner = builder.build().map_err(ObjectError::Build)?;

        Self::with_backend(Arc::new(inner), &config.bucket_name, &config.distribution)
    }

    pub(crate) fn with_backend(
        inner: Arc<dyn object_store::ObjectStore>,
        bucket_name: &str,
        distribution: &str,
    ) -> Result<Self, ObjectError> {
        let public_url = Url::parse(&format!("https://{distribution}/"))
            .map_err(|e| ObjectError::Distribution(distribution.to_string(), e))?;

        Ok(ObjectStore {
            inner,
            bucket_name: bucket_name.to_string(),
            public_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory(distribution: &str) -> (Self, Arc<object_store::memory::InMemory>) {
        let backend = Arc::new(object_store::memory::InMemory::new());

        let store = Self::with_backend(backend.clone(), "test-bucket", distribution)
            .expect("Valid distribution");

        (store, backend)
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket_name", &self.bucket_name)
            .field("public_url", &self.public_url.as_str())
            .finish()
    }
}
