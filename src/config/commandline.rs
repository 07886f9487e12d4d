use crate::config::primitives::{LogFormat, Targets};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            save_to,
            address,
            api_key,
            temporary_directory,
            metrics_prometheus_address,
            media_max_thumbnail_size,
            media_max_video_size,
            media_process_timeout,
            auth_jwt_secret,
            auth_issuer,
            repo_path,
            assets_path,
            assets_public_url,
            object_storage_endpoint,
            object_storage_bucket_name,
            object_storage_region,
            object_storage_access_key,
            object_storage_secret_key,
            object_storage_session_token,
            object_storage_use_path_style,
            object_storage_distribution,
        } = self;

        let server = Server {
            address,
            api_key,
            temporary_directory,
        };

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets,
                log_spans,
            },
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            max_thumbnail_size: media_max_thumbnail_size,
            max_video_size: media_max_video_size,
            process_timeout: media_process_timeout,
        };

        let auth = Auth {
            jwt_secret: auth_jwt_secret,
            issuer: auth_issuer,
        };

        let repo = repo_path.map(|path| Repo::Sled(Sled { path }));

        let assets = Assets {
            path: assets_path,
            public_url: assets_public_url,
        };

        let object_storage = ObjectStorage {
            endpoint: object_storage_endpoint,
            bucket_name: object_storage_bucket_name,
            region: object_storage_region,
            access_key: object_storage_access_key,
            secret_key: object_storage_secret_key,
            session_token: object_storage_session_token,
            use_path_style: object_storage_use_path_style,
            distribution: object_storage_distribution,
        };

        Output {
            config_format: ConfigFormat {
                server,
                tracing,
                metrics,
                media,
                auth,
                repo,
                assets,
                object_storage,
            },
            config_file,
            save_to,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    auth: Auth,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    assets: Assets,
    object_storage: ObjectStorage,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_thumbnail_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_video_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Auth {
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    Sled(Sled),
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    path: PathBuf,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_url: Option<Url>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ObjectStorage {
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    use_path_style: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution: Option<String>,
}

/// Run the reel-rs application
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the reel-rs configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    /// The address and port to bind the reel-rs web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The API KEY required to access restricted routes
    #[arg(long)]
    api_key: Option<String>,

    /// The directory uploads are staged in while they are processed
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Address and port to expose prometheus metrics
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// The maximum size, in megabytes, of an uploaded thumbnail
    #[arg(long)]
    media_max_thumbnail_size: Option<usize>,
    /// The maximum size, in megabytes, of an uploaded video
    #[arg(long)]
    media_max_video_size: Option<usize>,
    /// Timeout, in seconds, for ffprobe and ffmpeg invocations
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// Secret used to verify bearer tokens
    #[arg(long)]
    auth_jwt_secret: Option<String>,
    /// Issuer bearer tokens must carry
    #[arg(long)]
    auth_issuer: Option<String>,

    /// Path to the sled database holding video records
    #[arg(long)]
    repo_path: Option<PathBuf>,

    /// Directory thumbnails are written to
    #[arg(long)]
    assets_path: Option<PathBuf>,
    /// Base URL stored thumbnails are served from
    #[arg(long)]
    assets_public_url: Option<Url>,

    /// S3-compatible endpoint. Leave unset for AWS
    #[arg(long)]
    object_storage_endpoint: Option<Url>,
    /// Bucket videos are uploaded to
    #[arg(long)]
    object_storage_bucket_name: Option<String>,
    /// Region of the bucket
    #[arg(long)]
    object_storage_region: Option<String>,
    /// Access key for the bucket
    #[arg(long)]
    object_storage_access_key: Option<String>,
    /// Secret key for the bucket
    #[arg(long)]
    object_storage_secret_key: Option<String>,
    /// Session token for the bucket
    #[arg(long)]
    object_storage_session_token: Option<String>,
    /// Whether to address the bucket with path-style URLs
    #[arg(long)]
    object_storage_use_path_style: bool,
    /// Host of the distribution front-end serving the bucket
    #[arg(long)]
    object_storage_distribution: Option<String>,
}
