
use std::path::Path;

use crate::{
    classify::{MetadataProbe, ProbeOutput},
    error_code::ErrorCode,
    process::{Process, ProcessError},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("Invalid output format")]
    Json(#[source] serde_json::Error),

    #[error("Invalid file path")]
    Path,
}

impl From<ProcessError> for FfMpegError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) => ErrorCode::PROBE_OUTPUT,
            Self::Path => ErrorCode::FILE_IO_ERROR,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        match self {
            Self::Process(e) => e.is_client_error(),
            Self::Json(_) | Self::Path => false,
        }
    }
}

/// Rewrites a staged video so it can begin playing before it is fully downloaded
#[async_trait::async_trait(?Send)]
pub(crate) trait Remuxer: std::fmt::Debug + Send + Sync {
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), FfMpegError>;
}

#[derive(Clone, Debug)]
pub(crate) struct FfProbe {
    timeout: u64,
}

#[derive(Clone, Debug)]
pub(crate) struct FfMpegRemuxer {
    timeout: u64,
}

impl FfProbe {
    pub(crate) const fn new(timeout: u64) -> Self {
        FfProbe { timeout }
    }
}

impl FfMpegRemuxer {
    pub(crate) const fn new(timeout: u64) -> Self {
        FfMpegRemuxer { timeout }
    }
}

fn path_str(path: &Path) -> Result<&str, FfMpegError> {
    path.to_str().ok_or(FfMpegError::Path)
}

pub(crate) fn parse_probe_output(bytes: &[u8]) -> Result<ProbeOutput, FfMpegError> {
    serde_json::from_slice(bytes).map_err(FfMpegError::Json)
}

#[async_trait::async_trait(?Send)]
impl MetadataProbe for FfProbe {
    #[tracing::instrument(name = "ffprobe streams", skip(self))]
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, FfMpegError> {
        let input = path_str(path)?;

        let output = Process::run(
            "ffprobe",
            &[
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                input,
            ],
            self.timeout,
        )
        .await?
        .read_to_end()
        .await?;

        parse_probe_output(&output)
    }
}

#[async_trait::async_trait(?Send)]
impl Remuxer for FfMpegRemuxer {
    #[tracing::instrument(name = "ffmpeg faststart", skip(self))]
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), FfMpegError> {
        let input = path_str(input)?;
        let output = path_str(output)?;

        Process::run(
            "ffmpeg",
            &[
                "-hide_banner",
                "-v",
                "warning",
                "-y",
                "-i",
                input,
                "-c",
                "copy",
                "-movflags",
                "faststart",
                "-f",
                "mp4",
                output,
            ],
            self.timeout,
        )
        .await?
        .wait()
        .await?;

        Ok(())
    }
}
