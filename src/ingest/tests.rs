use actix_web::{
    http::header::{HeaderMap, HeaderValue, AUTHORIZATION},
    web::Bytes,
};
use futures_util::stream;
use object_store::{memory::InMemory, path::Path as ObjectPath, ObjectStore as _};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use uuid::Uuid;

use super::{authorize, ingest_thumbnail, ingest_video};
use crate::{
    auth::{issue_token, Authenticator},
    classify::{MetadataProbe, ProbeOutput, ProbeStream},
    config::{self, Configuration},
    error::{Error, UploadError},
    ffmpeg::{FfMpegError, Remuxer},
    process::ProcessError,
    repo::{sled::SledRepo, RepoError, VideoRecord, VideoRepo},
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore},
    tmp_file::TmpDir,
};

/// Reports a single video stream of the given size
#[derive(Debug)]
pub(crate) struct FixedProbe(pub(crate) u32, pub(crate) u32);

#[async_trait::async_trait(?Send)]
impl MetadataProbe for FixedProbe {
    async fn probe(&self, _: &Path) -> Result<ProbeOutput, FfMpegError> {
        Ok(ProbeOutput {
            streams: vec![
                ProbeStream {
                    width: None,
                    height: None,
                },
                ProbeStream {
                    width: Some(self.0),
                    height: Some(self.1),
                },
            ],
        })
    }
}

/// Behaves like ffprobe given something that isn't media
#[derive(Debug)]
struct RejectingProbe;

#[async_trait::async_trait(?Send)]
impl MetadataProbe for RejectingProbe {
    async fn probe(&self, _: &Path) -> Result<ProbeOutput, FfMpegError> {
        let status = std::process::Command::new("false")
            .status()
            .map_err(ProcessError::Other)?;

        Err(FfMpegError::Process(ProcessError::Status(
            String::from("ffprobe"),
            status,
        )))
    }
}

/// Stands in for ffmpeg by copying the input and tagging the end so tests can tell it ran
#[derive(Debug)]
pub(crate) struct CopyRemuxer;

#[async_trait::async_trait(?Send)]
impl Remuxer for CopyRemuxer {
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), FfMpegError> {
        let mut bytes = tokio::fs::read(input)
            .await
            .map_err(ProcessError::Other)?;
        bytes.extend_from_slice(b"+faststart");

        tokio::fs::write(output, bytes)
            .await
            .map_err(ProcessError::Other)?;

        Ok(())
    }
}

/// Fails partway through, after some output already reached disk
#[derive(Debug)]
struct PartialRemuxer;

#[async_trait::async_trait(?Send)]
impl Remuxer for PartialRemuxer {
    async fn remux(&self, _: &Path, output: &Path) -> Result<(), FfMpegError> {
        tokio::fs::write(output, b"ftyp")
            .await
            .map_err(ProcessError::Other)?;

        Err(FfMpegError::Process(ProcessError::Timeout(String::from(
            "ffmpeg",
        ))))
    }
}

/// Remuxes like `CopyRemuxer`, then leaves a directory where the staged upload was so it can't be
/// removed as a file
#[derive(Debug)]
struct SquattingRemuxer;

#[async_trait::async_trait(?Send)]
impl Remuxer for SquattingRemuxer {
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), FfMpegError> {
        CopyRemuxer.remux(input, output).await?;

        tokio::fs::remove_file(input)
            .await
            .map_err(ProcessError::Other)?;
        tokio::fs::create_dir(input)
            .await
            .map_err(ProcessError::Other)?;

        Ok(())
    }
}

/// Loads records normally but can never save them
#[derive(Debug)]
struct ReadOnlyRepo(SledRepo);

#[async_trait::async_trait(?Send)]
impl VideoRepo for ReadOnlyRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.0.health_check().await
    }

    async fn video(&self, id: Uuid) -> Result<Option<VideoRecord>, RepoError> {
        self.0.video(id).await
    }

    async fn create(&self, record: &VideoRecord) -> Result<(), RepoError> {
        self.0.create(record).await
    }

    async fn update(&self, _: &VideoRecord) -> Result<(), RepoError> {
        Err(RepoError::Canceled)
    }
}

pub(crate) struct Harness {
    pub(crate) state: State,
    pub(crate) sled: SledRepo,
    pub(crate) backend: Arc<InMemory>,
    pub(crate) root: TempDir,
}

pub(crate) fn configuration(root: &Path) -> Configuration {
    config::configure_without_clap(&serde_json::json!({
        "server": {
            "address": "127.0.0.1:8091",
            "api_key": "internal-key",
            "temporary_directory": root.join("tmp"),
        },
        "auth": { "jwt_secret": "super-secret" },
        "assets": { "path": root.join("assets") },
        "object_storage": {
            "bucket_name": "reel-videos",
            "distribution": "d111111abcdef8.cloudfront.net",
        },
    }))
    .expect("Valid configuration")
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_probe(Arc::new(FixedProbe(1920, 1080))).await
    }

    pub(crate) async fn with_probe(probe: Arc<dyn MetadataProbe>) -> Self {
        let root = tempfile::tempdir().expect("Created tempdir");
        let config = configuration(root.path());

        let sled = SledRepo::temporary();

        let tmp_dir = TmpDir::init(&config.server.temporary_directory)
            .await
            .expect("Created tmp dir");

        let assets = FileStore::build(
            config.assets.path.clone(),
            config.assets.public_url(config.server.address),
        )
        .await
        .expect("Built file store");

        let (videos, backend) = ObjectStore::in_memory(&config.object_storage.distribution);

        let state = State {
            auth: Authenticator::new(&config.auth),
            tmp_dir,
            repo: Arc::new(sled.clone()),
            assets,
            videos,
            probe,
            remuxer: Arc::new(CopyRemuxer),
            config,
        };

        Harness {
            state,
            sled,
            backend,
            root,
        }
    }

    pub(crate) fn without_updates(mut self) -> Self {
        self.state.repo = Arc::new(ReadOnlyRepo(self.sled.clone()));
        self
    }

    fn with_remuxer(mut self, remuxer: Arc<dyn Remuxer>) -> Self {
        self.state.remuxer = remuxer;
        self
    }

    pub(crate) async fn video_for(&self, user_id: Uuid) -> VideoRecord {
        let record = VideoRecord::new(
            user_id,
            String::from("Boots"),
            String::from("A tour of the boot collection"),
        );

        self.sled.create(&record).await.expect("Created record");

        record
    }

    pub(crate) fn token_for(&self, user_id: Uuid) -> String {
        issue_token(&self.state.config.auth, user_id, 3600)
    }

    pub(crate) fn headers_for(&self, user_id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token_for(user_id)))
                .expect("Valid header"),
        );
        headers
    }

    pub(crate) fn asset_names(&self) -> Vec<String> {
        std::fs::read_dir(self.root.path().join("assets"))
            .expect("Read assets")
            .map(|entry| {
                entry
                    .expect("Dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    pub(crate) fn tmp_is_empty(&self) -> bool {
        std::fs::read_dir(self.root.path().join("tmp"))
            .expect("Read tmp")
            .flat_map(|entry| std::fs::read_dir(entry.expect("Dir entry").path()).expect("Read"))
            .next()
            .is_none()
    }
}

fn body(bytes: &'static [u8]) -> impl futures_util::Stream<Item = Result<Bytes, Error>> + Unpin {
    stream::iter(vec![Ok(Bytes::from_static(bytes))])
}

fn mime(s: &str) -> mime::Mime {
    s.parse().expect("Valid mime")
}

fn failure(res: Result<VideoRecord, Error>) -> Error {
    res.expect_err("Request failed")
}

#[actix_rt::test]
async fn thumbnails_are_stored_and_recorded() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let updated = ingest_thumbnail(
        &harness.state,
        record.clone(),
        &mime("image/png"),
        body(b"\x89PNG"),
    )
    .await
    .expect("Ingested thumbnail");

    let url = updated.thumbnail_url.clone().expect("Thumbnail url");
    let name = url
        .strip_prefix("http://localhost:8091/assets/")
        .expect("Asset url");

    assert!(name.ends_with(".png"), "{url}");
    assert_eq!(name.len(), 43 + ".png".len());
    assert_eq!(harness.asset_names(), vec![name.to_string()]);

    let stored = harness
        .sled
        .video(record.id)
        .await
        .expect("Queried")
        .expect("Exists");
    assert_eq!(stored, updated);
    assert!(stored.video_url.is_none());
}

#[actix_rt::test]
async fn jpeg_thumbnails_keep_their_subtype() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let updated = ingest_thumbnail(
        &harness.state,
        record.clone(),
        &mime("image/jpeg"),
        body(b"\xff\xd8\xff"),
    )
    .await
    .expect("Ingested thumbnail");

    assert!(updated
        .thumbnail_url
        .expect("Thumbnail url")
        .ends_with(".jpeg"));
}

#[actix_rt::test]
async fn unsupported_thumbnails_store_nothing() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_thumbnail(
        &harness.state,
        record.clone(),
        &mime("image/gif"),
        body(b"GIF89a"),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::UnsupportedMediaType(t)) if t == "image/gif"));
    assert!(harness.asset_names().is_empty());
}

#[actix_rt::test]
async fn videos_are_remuxed_and_filed_by_shape() {
    let harness = Harness::with_probe(Arc::new(FixedProbe(1080, 1920))).await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let updated = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"ftypmoov"),
    )
    .await
    .expect("Ingested video");

    let url = updated.video_url.clone().expect("Video url");
    let key = url
        .strip_prefix("https://d111111abcdef8.cloudfront.net/")
        .expect("Distribution url");

    assert!(key.starts_with("portrait/"), "{key}");
    assert!(key.ends_with(".mp4"), "{key}");

    let bytes = harness
        .backend
        .get(&ObjectPath::from(key))
        .await
        .expect("Object exists")
        .bytes()
        .await
        .expect("Read object");
    assert_eq!(bytes.as_ref(), b"ftypmoov+faststart");

    let stored = harness
        .sled
        .video(record.id)
        .await
        .expect("Queried")
        .expect("Exists");
    assert_eq!(stored.video_url.as_deref(), Some(url.as_str()));
    assert!(harness.tmp_is_empty());
}

#[actix_rt::test]
async fn unusual_shapes_are_filed_as_other() {
    let harness = Harness::with_probe(Arc::new(FixedProbe(640, 480))).await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let updated = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"ftypmoov"),
    )
    .await
    .expect("Ingested video");

    assert!(updated
        .video_url
        .expect("Video url")
        .starts_with("https://d111111abcdef8.cloudfront.net/other/"));
}

#[actix_rt::test]
async fn videos_must_be_mp4() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/quicktime"),
        body(b"moov"),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::UnsupportedMediaType(_))));
}

#[actix_rt::test]
async fn unreadable_videos_are_cleaned_up() {
    let harness = Harness::with_probe(Arc::new(RejectingProbe)).await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"not really a video"),
    )
    .await;

    let error = failure(res);
    let Some(UploadError::Classify(e)) = error.kind() else {
        panic!("Expected a classification failure, got {error:?}");
    };
    assert!(e.is_client_error());
    assert!(harness.tmp_is_empty());

    let list = harness.backend.list_with_delimiter(None).await.expect("Listed");
    assert!(list.objects.is_empty() && list.common_prefixes.is_empty());
}

#[actix_rt::test]
async fn failed_thumbnail_record_removes_the_asset() {
    let harness = Harness::new().await.without_updates();
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_thumbnail(
        &harness.state,
        record.clone(),
        &mime("image/png"),
        body(b"\x89PNG"),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::RecordUpdate(_))));
    assert!(harness.asset_names().is_empty());
}

#[actix_rt::test]
async fn failed_video_record_removes_the_object() {
    let harness = Harness::new().await.without_updates();
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"ftypmoov"),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::RecordUpdate(_))));

    let landscape = ObjectPath::from("landscape");
    let list = harness
        .backend
        .list_with_delimiter(Some(&landscape))
        .await
        .expect("Listed");
    assert!(list.objects.is_empty());
}

#[actix_rt::test]
async fn malformed_ids_are_rejected_before_auth() {
    let harness = Harness::new().await;

    let res = authorize(&harness.state, "not-a-uuid", &HeaderMap::new()).await;

    assert!(matches!(failure(res).kind(), Some(UploadError::InvalidIdentifier(_))));
}

#[actix_rt::test]
async fn missing_tokens_are_rejected_before_lookup() {
    let harness = Harness::new().await;

    let res = authorize(&harness.state, &Uuid::new_v4().to_string(), &HeaderMap::new()).await;

    assert!(matches!(failure(res).kind(), Some(UploadError::Unauthenticated(_))));
}

#[actix_rt::test]
async fn unknown_videos_are_not_found() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();

    let res = authorize(
        &harness.state,
        &Uuid::new_v4().to_string(),
        &harness.headers_for(user_id),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::VideoNotFound)));
}

#[actix_rt::test]
async fn other_users_videos_are_off_limits() {
    let harness = Harness::new().await;
    let record = harness.video_for(Uuid::new_v4()).await;

    let res = authorize(
        &harness.state,
        &record.id.to_string(),
        &harness.headers_for(Uuid::new_v4()),
    )
    .await;

    assert!(matches!(failure(res).kind(), Some(UploadError::Unauthorized)));
}

#[actix_rt::test]
async fn owners_get_their_record_back() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let authorized = authorize(
        &harness.state,
        &record.id.to_string(),
        &harness.headers_for(user_id),
    )
    .await
    .expect("Authorized");

    assert_eq!(authorized, record);
}

#[actix_rt::test]
async fn failed_remux_leaves_no_temporary_files() {
    let harness = Harness::new()
        .await
        .with_remuxer(Arc::new(PartialRemuxer));
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let res = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"ftypmoov"),
    )
    .await;

    let error = failure(res);
    assert!(matches!(error.kind(), Some(UploadError::Remux(_))), "{error:?}");
    assert_eq!(error.error_code().as_str(), "command-timeout");
    assert!(harness.tmp_is_empty());

    let list = harness.backend.list_with_delimiter(None).await.expect("Listed");
    assert!(list.objects.is_empty() && list.common_prefixes.is_empty());
}

#[actix_rt::test]
async fn broken_upload_streams_leave_no_temporary_files() {
    let harness = Harness::new().await;
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let chunks = stream::iter(vec![
        Ok(Bytes::from_static(b"ftyp")),
        Err(Error::from(UploadError::Staging(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        )))),
    ]);

    let res = ingest_video(&harness.state, record.clone(), &mime("video/mp4"), chunks).await;

    assert!(matches!(failure(res).kind(), Some(UploadError::Staging(_))));
    assert!(harness.tmp_is_empty());

    let stored = harness
        .sled
        .video(record.id)
        .await
        .expect("Queried")
        .expect("Exists");
    assert!(stored.video_url.is_none());
}

#[actix_rt::test]
async fn stuck_temporary_files_do_not_fail_the_upload() {
    let harness = Harness::new()
        .await
        .with_remuxer(Arc::new(SquattingRemuxer));
    let user_id = Uuid::new_v4();
    let record = harness.video_for(user_id).await;

    let updated = ingest_video(
        &harness.state,
        record.clone(),
        &mime("video/mp4"),
        body(b"ftypmoov"),
    )
    .await
    .expect("Ingested video");

    let url = updated.video_url.clone().expect("Video url");
    let key = url
        .strip_prefix("https://d111111abcdef8.cloudfront.net/")
        .expect("Distribution url");

    harness
        .backend
        .head(&ObjectPath::from(key))
        .await
        .expect("Object exists");

    let stored = harness
        .sled
        .video(record.id)
        .await
        .expect("Queried")
        .expect("Exists");
    assert_eq!(stored.video_url.as_deref(), Some(url.as_str()));
}
