use std::path::Path;

use crate::{error_code::ErrorCode, ffmpeg::FfMpegError};

/// Width to height ratios strictly between these bounds are 16:9
const LANDSCAPE: (f64, f64) = (1.70, 1.80);

/// Width to height ratios strictly between these bounds are 9:16
const PORTRAIT: (f64, f64) = (0.56, 0.57);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AspectCategory {
    Landscape,
    Portrait,
    Other,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ProbeOutput {
    #[serde(default)]
    pub(crate) streams: Vec<ProbeStream>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ProbeStream {
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ClassifyError {
    #[error("Error probing media")]
    Probe(#[source] FfMpegError),

    #[error("Media has no stream with dimensions")]
    NoVideoStream,
}

impl ClassifyError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Probe(e) => e.error_code(),
            Self::NoVideoStream => ErrorCode::NO_VIDEO_STREAM,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        match self {
            Self::Probe(e) => e.is_client_error(),
            Self::NoVideoStream => true,
        }
    }
}

/// Reads the stream layout of a media file
#[async_trait::async_trait(?Send)]
pub(crate) trait MetadataProbe: std::fmt::Debug + Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, FfMpegError>;
}

impl AspectCategory {
    pub(crate) fn from_dimensions(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);

        if LANDSCAPE.0 < ratio && ratio < LANDSCAPE.1 {
            Self::Landscape
        } else if PORTRAIT.0 < ratio && ratio < PORTRAIT.1 {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AspectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProbeOutput {
    /// Dimensions of the first stream that reports a nonzero width and height
    pub(crate) fn video_dimensions(&self) -> Option<(u32, u32)> {
        self.streams.iter().find_map(|stream| match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        })
    }
}

#[tracing::instrument(skip(probe))]
pub(crate) async fn classify(
    probe: &dyn MetadataProbe,
    path: &Path,
) -> Result<AspectCategory, ClassifyError> {
    let output = probe.probe(path).await.map_err(ClassifyError::Probe)?;

    let (width, height) = output
        .video_dimensions()
        .ok_or(ClassifyError::NoVideoStream)?;

    let category = AspectCategory::from_dimensions(width, height);

    tracing::debug!(width, height, %category, "Classified video");

    Ok(category)
}

#[cfg(test)]
mod tests {
    use super::{classify, AspectCategory, ClassifyError, MetadataProbe, ProbeOutput, ProbeStream};
    use crate::{ffmpeg::FfMpegError, process::ProcessError};
    use std::path::Path;

    #[derive(Debug)]
    struct Fixed(Vec<(Option<u32>, Option<u32>)>);

    #[async_trait::async_trait(?Send)]
    impl MetadataProbe for Fixed {
        async fn probe(&self, _: &Path) -> Result<ProbeOutput, FfMpegError> {
            Ok(ProbeOutput {
                streams: self
                    .0
                    .iter()
                    .map(|(width, height)| ProbeStream {
                        width: *width,
                        height: *height,
                    })
                    .collect(),
            })
        }
    }

    #[derive(Debug)]
    struct Missing;

    #[async_trait::async_trait(?Send)]
    impl MetadataProbe for Missing {
        async fn probe(&self, _: &Path) -> Result<ProbeOutput, FfMpegError> {
            Err(FfMpegError::Process(ProcessError::NotFound(String::from(
                "ffprobe",
            ))))
        }
    }

    #[test]
    fn categorizes_common_resolutions() {
        let cases = [
            ((1920, 1080), AspectCategory::Landscape),
            ((1280, 720), AspectCategory::Landscape),
            ((1080, 1920), AspectCategory::Portrait),
            ((720, 1280), AspectCategory::Portrait),
            ((1000, 1000), AspectCategory::Other),
            ((640, 480), AspectCategory::Other),
            ((1024, 576), AspectCategory::Landscape),
        ];

        for ((width, height), expected) in cases {
            assert_eq!(
                AspectCategory::from_dimensions(width, height),
                expected,
                "{width}x{height}"
            );
        }
    }

    #[test]
    fn band_edges_are_excluded() {
        assert_eq!(AspectCategory::from_dimensions(170, 100), AspectCategory::Other);
        assert_eq!(AspectCategory::from_dimensions(180, 100), AspectCategory::Other);
        assert_eq!(AspectCategory::from_dimensions(56, 100), AspectCategory::Other);
        assert_eq!(AspectCategory::from_dimensions(57, 100), AspectCategory::Other);
        assert_eq!(AspectCategory::from_dimensions(171, 100), AspectCategory::Landscape);
        assert_eq!(AspectCategory::from_dimensions(565, 1000), AspectCategory::Portrait);
    }

    #[actix_rt::test]
    async fn first_stream_with_dimensions_wins() {
        let probe = Fixed(vec![(None, None), (Some(1080), Some(1920)), (Some(1920), Some(1080))]);

        let category = classify(&probe, Path::new("video.mp4"))
            .await
            .expect("Classified");

        assert_eq!(category, AspectCategory::Portrait);
    }

    #[actix_rt::test]
    async fn audio_only_has_no_video_stream() {
        let probe = Fixed(vec![(None, None)]);

        let res = classify(&probe, Path::new("audio.mp4")).await;

        assert!(matches!(res, Err(ClassifyError::NoVideoStream)));
    }

    #[actix_rt::test]
    async fn empty_stream_list_has_no_video_stream() {
        let probe = Fixed(vec![]);

        let res = classify(&probe, Path::new("empty.mp4")).await;

        assert!(matches!(res, Err(ClassifyError::NoVideoStream)));
    }

    #[actix_rt::test]
    async fn probe_failures_are_not_replaced_by_a_category() {
        let res = classify(&Missing, Path::new("video.mp4")).await;

        let Err(ClassifyError::Probe(FfMpegError::Process(ProcessError::NotFound(_)))) = res else {
            panic!("Expected a probe failure, got {res:?}");
        };
    }
}
