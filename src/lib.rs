mod auth;
mod classify;
mod config;
mod error;
mod error_code;
mod ffmpeg;
mod file;
mod formats;
mod ingest;
mod init_tracing;
mod key;
mod middleware;
mod process;
mod repo;
mod state;
mod store;
mod tmp_file;


use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{
    http::header::{CacheControl, CacheDirective},
    web, App, HttpMessage, HttpRequest, HttpResponse, HttpServer,
};
use futures_util::TryStreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{path::Path, sync::Arc};
use tracing::Instrument;
use tracing_actix_web::TracingLogger;
use uuid::Uuid;

use self::{
    auth::Authenticator,
    config::Configuration,
    error::{Error, UploadError},
    ffmpeg::{FfMpegRemuxer, FfProbe},
    formats::ThumbnailFormat,
    init_tracing::init_tracing,
    middleware::{Internal, Ownership},
    repo::VideoRecord,
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

const MEGABYTES: usize = 1024 * 1024;
const MINUTES: u32 = 60;
const HOURS: u32 = 60 * MINUTES;
const DAYS: u32 = 24 * HOURS;

fn request_state(req: &HttpRequest) -> web::Data<State> {
    req.app_data::<web::Data<State>>()
        .expect("No state in request")
        .clone()
}

/// The record `Ownership` loaded for this request
fn owned_record(req: &HttpRequest) -> Result<VideoRecord, Error> {
    req.extensions()
        .get::<VideoRecord>()
        .cloned()
        .ok_or_else(|| UploadError::Unauthorized.into())
}

struct ThumbnailUpload(Value<VideoRecord>);

impl FormData for ThumbnailUpload {
    type Item = VideoRecord;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        let state = request_state(req);
        let record = owned_record(req)?;

        let max_file_size = state
            .config
            .media
            .max_thumbnail_size
            .saturating_mul(MEGABYTES);

        // A single file field, 'thumbnail', holding a jpeg or png
        Ok(Form::new()
            .max_files(1)
            .max_file_size(max_file_size)
            .transform_error(transform_error)
            .field(
                "thumbnail",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();
                    let record = record.clone();

                    metrics::counter!("reel-rs.files", "upload" => "thumbnail").increment(1);

                    let span = tracing::info_span!("thumbnail-upload", ?filename);

                    let stream = stream.map_err(Error::from);

                    Box::pin(
                        async move {
                            ingest::ingest_thumbnail(&state, record, &content_type, stream).await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(ThumbnailUpload(value))
    }
}

struct VideoUpload(Value<VideoRecord>);

impl FormData for VideoUpload {
    type Item = VideoRecord;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        let state = request_state(req);
        let record = owned_record(req)?;

        let max_file_size = state
            .config
            .media
            .max_video_size
            .saturating_mul(MEGABYTES);

        Ok(Form::new()
            .max_files(1)
            .max_file_size(max_file_size)
            .transform_error(transform_error)
            .field(
                "video",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();
                    let record = record.clone();

                    metrics::counter!("reel-rs.files", "upload" => "video").increment(1);

                    let span = tracing::info_span!("video-upload", ?filename);

                    let stream = stream.map_err(Error::from);

                    Box::pin(
                        async move {
                            ingest::ingest_video(&state, record, &content_type, stream).await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value))
    }
}

/// Handle responding to a finished thumbnail upload
#[tracing::instrument(name = "Uploaded thumbnail", skip(value))]
async fn upload_thumbnail(
    Multipart(ThumbnailUpload(value)): Multipart<ThumbnailUpload>,
) -> Result<HttpResponse, Error> {
    handle_upload(value, "thumbnail")
}

/// Handle responding to a finished video upload
#[tracing::instrument(name = "Uploaded video", skip(value))]
async fn upload_video(
    Multipart(VideoUpload(value)): Multipart<VideoUpload>,
) -> Result<HttpResponse, Error> {
    handle_upload(value, "video")
}

fn handle_upload(value: Value<VideoRecord>, field: &str) -> Result<HttpResponse, Error> {
    let file = value
        .map()
        .and_then(|mut m| m.remove(field))
        .and_then(|part| part.file());

    let Some(file) = file else {
        return Err(UploadError::NoFiles.into());
    };

    tracing::debug!("Finished upload of {:?}", file.filename);

    Ok(HttpResponse::Ok().json(&file.result))
}

/// Fetch a video record on behalf of its owner
#[tracing::instrument(name = "Fetching video", skip(record))]
async fn video(record: web::ReqData<VideoRecord>) -> HttpResponse {
    HttpResponse::Ok().json(record.into_inner())
}

/// Serve a stored thumbnail
#[tracing::instrument(name = "Serving asset", skip(state))]
async fn serve_asset(
    filename: web::Path<String>,
    state: web::Data<State>,
) -> Result<HttpResponse, Error> {
    let stream = state.assets.to_stream(&filename).await?;

    let content_type = Path::new(filename.as_str())
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ThumbnailFormat::from_extension)
        .map(ThumbnailFormat::media_type)
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(CacheControl(vec![
            CacheDirective::Public,
            CacheDirective::MaxAge(7 * DAYS),
            CacheDirective::Extension("immutable".to_owned(), None),
        ]))
        .streaming(stream))
}

#[derive(Debug, serde::Deserialize)]
struct NewVideo {
    user_id: Uuid,
    title: String,
    #[serde(default)]
    description: String,
}

/// Register a video for a user so they can upload media to it
#[tracing::instrument(name = "Creating video", skip(state))]
async fn create_video(
    new_video: web::Json<NewVideo>,
    state: web::Data<State>,
) -> Result<HttpResponse, Error> {
    let NewVideo {
        user_id,
        title,
        description,
    } = new_video.into_inner();

    let record = VideoRecord::new(user_id, title, description);

    state.repo.create(&record).await?;

    metrics::counter!("reel-rs.videos.created").increment(1);

    Ok(HttpResponse::Created().json(&record))
}

async fn healthz(state: web::Data<State>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.assets.health_check().await?;
    state.videos.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints(config: &mut web::ServiceConfig, state: State) {
    let api_key = state.config.server.api_key.clone();

    config
        .app_data(web::Data::new(state))
        .route("/healthz", web::get().to(healthz))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/thumbnail_upload/{video_id}")
                        .wrap(Ownership)
                        .route(web::post().to(upload_thumbnail)),
                )
                .service(
                    web::resource("/video_upload/{video_id}")
                        .wrap(Ownership)
                        .route(web::post().to(upload_video)),
                )
                .service(
                    web::resource("/videos/{video_id}")
                        .wrap(Ownership)
                        .route(web::get().to(video)),
                ),
        )
        .service(web::resource("/assets/{filename}").route(web::get().to(serve_asset)))
        .service(
            web::scope("/internal")
                .wrap(Internal(api_key))
                .service(web::resource("/videos").route(web::post().to(create_video))),
        );
}

async fn launch(state: State) -> color_eyre::Result<()> {
    let address = state.config.server.address;

    tracing::info!("Starting reel-rs on {address}");

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| configure_endpoints(sc, state))
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

/// A fully loaded reel-rs configuration, ready to run the server
pub struct ReelConfiguration {
    config: Configuration,
}

impl ReelConfiguration {
    /// Build the configuration from defaults, an optional file, the environment and the
    /// commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        Ok(ReelConfiguration {
            config: config::configure()?,
        })
    }

    /// Build the configuration from defaults and the given overrides alone
    ///
    /// Useful when embedding reel-rs in an application that owns its own commandline.
    pub fn from_overrides<T: serde::Serialize>(overrides: &T) -> color_eyre::Result<Self> {
        Ok(ReelConfiguration {
            config: config::configure_without_clap(overrides)?,
        })
    }

    /// Install the default reel-rs tracer
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing.logging)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
        }

        Ok(self)
    }

    /// Open the repo and stores, then serve requests until shutdown
    pub async fn run(self) -> color_eyre::Result<()> {
        let ReelConfiguration { config } = self;

        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;

        let repo = repo::open(&config.repo)?;

        let assets = FileStore::build(
            config.assets.path.clone(),
            config.assets.public_url(config.server.address),
        )
        .await?;

        let videos = ObjectStore::build(&config.object_storage)?;

        let state = State {
            auth: Authenticator::new(&config.auth),
            tmp_dir: tmp_dir.clone(),
            repo,
            assets,
            videos,
            probe: Arc::new(FfProbe::new(config.media.process_timeout)),
            remuxer: Arc::new(FfMpegRemuxer::new(config.media.process_timeout)),
            config,
        };

        launch(state).await?;

        tmp_dir.cleanup().await?;

        Ok(())
    }
}
