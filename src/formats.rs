use mime::Mime;

/// Image types accepted as thumbnails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThumbnailFormat {
    Jpeg,
    Png,
}

/// Container types accepted as videos
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VideoFormat {
    Mp4,
}

impl ThumbnailFormat {
    pub(crate) fn from_media_type(media_type: &Mime) -> Option<Self> {
        match (media_type.type_(), media_type.subtype()) {
            (mime::IMAGE, mime::JPEG) => Some(Self::Jpeg),
            (mime::IMAGE, mime::PNG) => Some(Self::Png),
            _ => None,
        }
    }

    pub(crate) fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub(crate) fn media_type(self) -> Mime {
        match self {
            Self::Jpeg => mime::IMAGE_JPEG,
            Self::Png => mime::IMAGE_PNG,
        }
    }

    /// The media subtype, used verbatim as the stored file's extension
    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl VideoFormat {
    pub(crate) fn from_media_type(media_type: &Mime) -> Option<Self> {
        if media_type.type_() == mime::VIDEO && media_type.subtype() == "mp4" {
            Some(Self::Mp4)
        } else {
            None
        }
    }

    pub(crate) fn media_type(self) -> Mime {
        match self {
            Self::Mp4 => video_mp4(),
        }
    }

    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
        }
    }
}

fn video_mp4() -> Mime {
    "video/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
