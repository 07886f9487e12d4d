#[cfg(test)]
pub(crate) mod tests;

use actix_web::{http::header::HeaderMap, web::Bytes};
use futures_util::{Stream, StreamExt, TryStreamExt};
use mime::Mime;
use std::path::Path;
use uuid::Uuid;

use crate::{
    auth::bearer_token,
    classify::classify,
    error::{Error, UploadError},
    file::File,
    formats::{ThumbnailFormat, VideoFormat},
    key::Key,
    repo::VideoRecord,
    state::State,
    store::Store,
    tmp_file::TmpFile,
};

/// Resolve the video an upload or lookup targets, making sure the caller owns it
///
/// The id is checked before the token, and the token before the record is loaded, so malformed
/// requests never reach the repo.
#[tracing::instrument(skip(state, headers))]
pub(crate) async fn authorize(
    state: &State,
    video_id: &str,
    headers: &HeaderMap,
) -> Result<VideoRecord, Error> {
    let video_id: Uuid = video_id.parse().map_err(UploadError::InvalidIdentifier)?;

    let user_id = state.auth.validate(bearer_token(headers)?)?;

    let record = state
        .repo
        .video(video_id)
        .await?
        .ok_or(UploadError::VideoNotFound)?;

    if !record.is_owned_by(user_id) {
        return Err(UploadError::Unauthorized.into());
    }

    Ok(record)
}

#[tracing::instrument(name = "Ingest thumbnail", skip(state, record, stream), fields(video_id = %record.id))]
pub(crate) async fn ingest_thumbnail<S>(
    state: &State,
    record: VideoRecord,
    content_type: &Mime,
    stream: S,
) -> Result<VideoRecord, Error>
where
    S: Stream<Item = Result<Bytes, Error>> + Unpin + 'static,
{
    let format = ThumbnailFormat::from_media_type(content_type)
        .ok_or_else(|| UploadError::UnsupportedMediaType(content_type.to_string()))?;

    let key = Key::generate()?.with_extension(format.file_extension());
    let url = state.assets.public_url(&key)?;

    state
        .assets
        .save_stream(&key, stream, format.media_type())
        .await?;

    metrics::counter!("reel-rs.ingest.stored", "kind" => "thumbnail").increment(1);

    record_upload(
        state,
        &state.assets,
        &key,
        record.with_thumbnail_url(url.to_string()),
    )
    .await
}

#[tracing::instrument(name = "Ingest video", skip(state, record, stream), fields(video_id = %record.id))]
pub(crate) async fn ingest_video<S>(
    state: &State,
    record: VideoRecord,
    content_type: &Mime,
    stream: S,
) -> Result<VideoRecord, Error>
where
    S: Stream<Item = Result<Bytes, Error>> + Unpin + 'static,
{
    let format = VideoFormat::from_media_type(content_type)
        .ok_or_else(|| UploadError::UnsupportedMediaType(content_type.to_string()))?;

    let extension = format!(".{}", format.file_extension());

    let staged = state.tmp_dir.tmp_file(Some(&extension));
    let written = stage(&staged, stream).await?;

    metrics::histogram!("reel-rs.ingest.staged-bytes").record(written as f64);

    let category = classify(&*state.probe, &staged).await?;

    let remuxed = state.tmp_dir.tmp_file(Some(&extension));
    state
        .remuxer
        .remux(&staged, &remuxed)
        .await
        .map_err(UploadError::Remux)?;

    discard(staged).await;

    let key = Key::generate()?.in_category(category, format.file_extension());
    let url = state.videos.public_url(&key)?;

    let file = File::open(&remuxed)
        .await
        .map_err(UploadError::Staging)?;

    state
        .videos
        .save_stream(
            &key,
            file.read_to_stream()
                .map_err(|e| Error::from(UploadError::Staging(e))),
            format.media_type(),
        )
        .await?;

    discard(remuxed).await;

    metrics::counter!("reel-rs.ingest.stored", "kind" => "video", "category" => category.as_str())
        .increment(1);

    record_upload(
        state,
        &state.videos,
        &key,
        record.with_video_url(url.to_string()),
    )
    .await
}

/// Copy the upload to local disk so it can be probed and remuxed
#[tracing::instrument(skip(stream))]
async fn stage<S>(path: &Path, stream: S) -> Result<u64, Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let mut file = File::create(path).await.map_err(UploadError::Staging)?;

    futures_util::pin_mut!(stream);

    let mut written = 0;

    while let Some(res) = stream.next().await {
        let bytes = res?;
        written += bytes.len() as u64;

        file.write_from_bytes(bytes)
            .await
            .map_err(UploadError::Staging)?;
    }

    file.close().await.map_err(UploadError::Staging)?;

    tracing::debug!("Staged {written} bytes");

    Ok(written)
}

/// Remove a temporary file the upload is done with, leaving failures to the logs
async fn discard(file: TmpFile) {
    let path = file.to_path_buf();

    if let Err(e) = file.cleanup().await {
        tracing::warn!("Failed to remove temporary file {path:?}: {e}");
    }
}

/// Persist the new url, removing the stored object again if the record can't be saved
async fn record_upload<S: Store>(
    state: &State,
    store: &S,
    key: &str,
    record: VideoRecord,
) -> Result<VideoRecord, Error> {
    if let Err(e) = state.repo.update(&record).await {
        if let Err(remove_error) = store.remove(key).await {
            tracing::warn!("Failed to remove orphaned {key}: {remove_error}");
        }

        return Err(UploadError::RecordUpdate(e).into());
    }

    Ok(record)
}
