use crate::{
    error_code::ErrorCode,
    repo::{RepoError, VideoRecord, VideoRepo},
};
use sled::{Db, IVec, Tree};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use uuid::Uuid;

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        let span = tracing::Span::current();

        actix_rt::task::spawn_blocking(move || span.in_scope(|| $expr))
            .await
            .map_err(|_| RepoError::Canceled)??
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video json")]
    Json(#[from] serde_json::Error),
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) | Self::Json(_) => ErrorCode::SLED_ERROR,
        }
    }
}

impl From<sled::Error> for RepoError {
    fn from(value: sled::Error) -> Self {
        Self::SledError(SledError::from(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::SledError(SledError::from(value))
    }
}

#[derive(Clone)]
pub(crate) struct SledRepo {
    healthz_count: Arc<AtomicU64>,
    healthz: Tree,
    videos: Tree,
    _db: Db,
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> Result<Self, SledError> {
        let db = sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Self::new(db)
    }

    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            healthz_count: Arc::new(AtomicU64::new(0)),
            healthz: db.open_tree("reel-rs-healthz-tree")?,
            videos: db.open_tree("reel-rs-videos-tree")?,
            _db: db,
        })
    }

    #[cfg(test)]
    pub(crate) fn temporary() -> Self {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("Opened temporary db");

        Self::new(db).expect("Opened trees")
    }
}

fn parse_record(ivec: Option<IVec>) -> Result<Option<VideoRecord>, RepoError> {
    let Some(ivec) = ivec else {
        return Ok(None);
    };

    Ok(Some(serde_json::from_slice(&ivec)?))
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.healthz_count.fetch_add(1, Ordering::Relaxed);
        b!(self.healthz, {
            healthz.insert("healthz", &next.to_be_bytes()[..])
        });
        self.healthz.flush_async().await?;
        b!(self.healthz, healthz.get("healthz"));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn video(&self, id: Uuid) -> Result<Option<VideoRecord>, RepoError> {
        let opt = b!(self.videos, videos.get(id.as_bytes()));

        parse_record(opt)
    }

    #[tracing::instrument(skip(self, record), fields(id = %record.id))]
    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError> {
        let id = record.id;
        let bytes = serde_json::to_vec(record)?;

        b!(self.videos, {
            let res = videos.compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(bytes))?;

            if res.is_err() {
                return Err(RepoError::AlreadyExists(id));
            }

            Ok(()) as Result<(), RepoError>
        });

        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(id = %record.id))]
    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError> {
        let id = record.id;
        let bytes = serde_json::to_vec(record)?;

        b!(self.videos, {
            let mut current = videos.get(id.as_bytes())?;

            loop {
                let Some(previous) = current else {
                    return Err(RepoError::Missing(id));
                };

                match videos.compare_and_swap(id.as_bytes(), Some(previous), Some(bytes.clone()))? {
                    Ok(()) => break,
                    Err(e) => current = e.current,
                }
            }

            Ok(()) as Result<(), RepoError>
        });

        Ok(())
    }
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}
