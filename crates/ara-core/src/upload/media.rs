//! Upload payload types.

use crate::report::MediaKind;
use bytes::{Bytes, BytesMut};

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Original file name.
    pub name: String,
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaItem {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Image or video, judged by MIME type; `None` when unsupported.
    pub fn media_kind(&self) -> MediaKind {
        kind_of(&self.mime_type)
    }
}

fn kind_of(mime_type: &str) -> MediaKind {
    let top_level = mime_type
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match top_level.as_str() {
        "image" => MediaKind::Image,
        "video" => MediaKind::Video,
        _ => MediaKind::None,
    }
}

/// A finished camera recording, assembled from time-sliced fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClip {
    pub mime_type: String,
    pub data: Bytes,
}

impl RecordedClip {
    /// Concatenates fragments in arrival order into one playable clip.
    pub fn from_chunks(mime_type: impl Into<String>, chunks: &[Bytes]) -> Self {
        let total = chunks.iter().map(Bytes::len).sum();
        let mut buffer = BytesMut::with_capacity(total);
        for chunk in chunks {
            buffer.extend_from_slice(chunk);
        }
        Self {
            mime_type: mime_type.into(),
            data: buffer.freeze(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The clip as an uploadable item with a file name derived from its type.
    pub fn to_media_item(&self) -> MediaItem {
        let extension = self
            .mime_type
            .split('/')
            .nth(1)
            .and_then(|subtype| subtype.split(';').next())
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("webm");
        MediaItem::new(
            format!("recording.{extension}"),
            self.mime_type.clone(),
            self.data.clone(),
        )
    }
}

/// What one upload job transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPayload {
    /// Files picked by the user.
    Files(Vec<MediaItem>),
    /// A single camera recording.
    Recording(RecordedClip),
}

impl UploadPayload {
    pub fn item_count(&self) -> usize {
        match self {
            Self::Files(files) => files.len(),
            Self::Recording(_) => 1,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        match self {
            Self::Files(files) => files.iter().map(MediaItem::size).sum(),
            Self::Recording(clip) => clip.size(),
        }
    }
}
