use crate::{config, error_code::ErrorCode};
use std::{fmt::Debug, sync::Arc};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) mod sled;

use self::sled::{SledError, SledRepo};

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

/// A video a user has registered, along with wherever its media ended up
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct VideoRecord {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) video_url: Option<String>,
}

impl VideoRecord {
    pub(crate) fn new(user_id: Uuid, title: String, description: String) -> Self {
        let now = OffsetDateTime::now_utc();

        VideoRecord {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            created_at: now,
            updated_at: now,
            thumbnail_url: None,
            video_url: None,
        }
    }

    pub(crate) fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub(crate) fn with_thumbnail_url(mut self, url: String) -> Self {
        self.thumbnail_url = Some(url);
        self.updated_at = OffsetDateTime::now_utc();
        self
    }

    pub(crate) fn with_video_url(mut self, url: String) -> Self {
        self.video_url = Some(url);
        self.updated_at = OffsetDateTime::now_utc();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] SledError),

    #[error("Record {0} does not exist")]
    Missing(Uuid),

    #[error("Record {0} already exists")]
    AlreadyExists(Uuid),

    #[error("Panic in blocking operation")]
    Canceled,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::Missing(_) => ErrorCode::VIDEO_NOT_FOUND,
            Self::AlreadyExists(_) => ErrorCode::DUPLICATE_VIDEO,
            Self::Canceled => ErrorCode::PANIC,
        }
    }

    pub(crate) const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Debug + Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;

    async fn video(&self, id: Uuid) -> Result<Option<VideoRecord>, RepoError>;

    /// Insert a new record, refusing to replace one with the same id
    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError>;

    /// Replace an existing record, refusing to create one that doesn't exist
    async fn update(&self, record: &VideoRecord) -> Result<(), RepoError>;
}

pub(crate) fn open(config: &config::Repo) -> color_eyre::Result<ArcRepo> {
    match config {
        config::Repo::Sled(config::Sled {
            path,
            cache_capacity,
        }) => {
            let repo = SledRepo::build(path.clone(), *cache_capacity)?;

            Ok(Arc::new(repo))
        }
    }
}
