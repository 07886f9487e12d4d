use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Provided video id is not a valid UUID")]
    InvalidIdentifier(#[source] uuid::Error),

    #[error("Couldn't authenticate request")]
    Unauthenticated(#[from] crate::auth::AuthError),

    #[error("Video belongs to another user")]
    Unauthorized,

    #[error("Requested a video that doesn't exist")]
    VideoNotFound,

    #[error("Media type {0} is not accepted here")]
    UnsupportedMediaType(String),

    #[error("Error staging upload")]
    Staging(#[source] std::io::Error),

    #[error("Error classifying video")]
    Classify(#[from] crate::classify::ClassifyError),

    #[error("Error remuxing video")]
    Remux(#[source] crate::ffmpeg::FfMpegError),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error recording uploaded media")]
    RecordUpdate(#[source] crate::repo::RepoError),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error generating storage key")]
    KeyGeneration(#[from] crate::key::KeyError),

    #[error("No files present in upload")]
    NoFiles,

    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidIdentifier(_) => ErrorCode::INVALID_VIDEO_ID,
            Self::Unauthenticated(e) => e.error_code(),
            Self::Unauthorized => ErrorCode::NOT_OWNER,
            Self::VideoNotFound => ErrorCode::VIDEO_NOT_FOUND,
            Self::UnsupportedMediaType(_) => ErrorCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Staging(_) => ErrorCode::STAGING_ERROR,
            Self::Classify(e) => e.error_code(),
            Self::Remux(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::RecordUpdate(_) => ErrorCode::RECORD_UPDATE,
            Self::Repo(e) => e.error_code(),
            Self::KeyGeneration(_) => ErrorCode::KEY_GENERATION,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::InvalidIdentifier(_)
                | UploadError::UnsupportedMediaType(_)
                | UploadError::NoFiles
                | UploadError::Upload(_),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::Classify(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Remux(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Store(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(UploadError::Unauthenticated(_)) => StatusCode::UNAUTHORIZED,
            Some(UploadError::Unauthorized) => StatusCode::FORBIDDEN,
            Some(UploadError::VideoNotFound) => StatusCode::NOT_FOUND,
            Some(UploadError::Store(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(UploadError::Repo(e)) if e.is_missing() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
