//! Local upload validation rules.

use super::media::{MediaItem, RecordedClip, UploadPayload};
use crate::error::{ItemRejection, RejectionReason, ValidationError};
use crate::report::MediaKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MIN_IMAGES: usize = 4;
pub const DEFAULT_MAX_IMAGES: usize = 6;
const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Limits applied to every payload before it reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Per-file size ceiling.
    pub max_file_bytes: u64,
    /// Fewest images an all-image batch may contain.
    pub min_images: usize,
    /// Most images an all-image batch may contain.
    pub max_images: usize,
    /// Transfer granularity, which is also the progress reporting granularity.
    pub chunk_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            min_images: DEFAULT_MIN_IMAGES,
            max_images: DEFAULT_MAX_IMAGES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl UploadPolicy {
    /// Validates a payload and returns the kind of media it carries.
    ///
    /// Rules, in order:
    /// 1. the payload is non-empty;
    /// 2. every item is an image or a video within the size ceiling
    ///    (all offending items are reported together);
    /// 3. a video travels alone;
    /// 4. an all-image batch holds between `min_images` and `max_images` items.
    pub fn validate(&self, payload: &UploadPayload) -> Result<MediaKind, ValidationError> {
        match payload {
            UploadPayload::Files(files) => self.validate_files(files),
            UploadPayload::Recording(clip) => self.validate_recording(clip),
        }
    }

    fn validate_files(&self, files: &[MediaItem]) -> Result<MediaKind, ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        let rejections: Vec<ItemRejection> = files
            .iter()
            .filter_map(|item| {
                self.check_item(item).map(|reason| ItemRejection {
                    name: item.name.clone(),
                    reason,
                })
            })
            .collect();
        if !rejections.is_empty() {
            return Err(ValidationError::Rejected(rejections));
        }

        let videos = files
            .iter()
            .filter(|item| item.media_kind() == MediaKind::Video)
            .count();
        let images = files.len() - videos;

        if videos > 0 {
            return if videos == 1 && images == 0 {
                Ok(MediaKind::Video)
            } else {
                Err(ValidationError::MixedVideoBatch { videos, images })
            };
        }

        if images < self.min_images {
            return Err(ValidationError::TooFewImages {
                count: images,
                min: self.min_images,
            });
        }
        if images > self.max_images {
            return Err(ValidationError::TooManyImages {
                count: images,
                max: self.max_images,
            });
        }
        Ok(MediaKind::Image)
    }

    fn validate_recording(&self, clip: &RecordedClip) -> Result<MediaKind, ValidationError> {
        if clip.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        let item = clip.to_media_item();
        let reason = self.check_item(&item).or_else(|| {
            (item.media_kind() != MediaKind::Video).then(|| RejectionReason::UnsupportedType {
                mime_type: item.mime_type.clone(),
            })
        });
        match reason {
            Some(reason) => Err(ValidationError::Rejected(vec![ItemRejection {
                name: item.name,
                reason,
            }])),
            None => Ok(MediaKind::Video),
        }
    }

    /// Checks a single item on its own, without any batch rule.
    pub fn check_item(&self, item: &MediaItem) -> Option<RejectionReason> {
        if item.media_kind() == MediaKind::None {
            return Some(RejectionReason::UnsupportedType {
                mime_type: item.mime_type.clone(),
            });
        }
        if item.size() > self.max_file_bytes {
            return Some(RejectionReason::TooLarge {
                size: item.size(),
                limit: self.max_file_bytes,
            });
        }
        if item.size() == 0 {
            return Some(RejectionReason::Empty);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn photos(count: usize) -> UploadPayload {
        UploadPayload::Files(
            (0..count)
                .map(|i| MediaItem::new(format!("photo{i}.jpg"), "image/jpeg", vec![1u8; 16]))
                .collect(),
        )
    }

    fn video() -> MediaItem {
        MediaItem::new("scene.mp4", "video/mp4", vec![1u8; 64])
    }

    #[test]
    fn image_count_bounds() {
        let policy = UploadPolicy::default();

        assert_eq!(
            policy.validate(&photos(3)),
            Err(ValidationError::TooFewImages { count: 3, min: 4 })
        );
        for count in 4..=6 {
            assert_eq!(policy.validate(&photos(count)), Ok(MediaKind::Image));
        }
        assert_eq!(
            policy.validate(&photos(7)),
            Err(ValidationError::TooManyImages { count: 7, max: 6 })
        );
    }

    #[test]
    fn single_video_bypasses_count_rule() {
        let policy = UploadPolicy::default();
        let payload = UploadPayload::Files(vec![video()]);
        assert_eq!(policy.validate(&payload), Ok(MediaKind::Video));
    }

    #[test]
    fn video_with_photos_is_refused() {
        let policy = UploadPolicy::default();
        let UploadPayload::Files(mut files) = photos(4) else {
            unreachable!()
        };
        files.push(video());

        assert_eq!(
            policy.validate(&UploadPayload::Files(files)),
            Err(ValidationError::MixedVideoBatch {
                videos: 1,
                images: 4
            })
        );
    }

    #[test]
    fn two_videos_are_refused() {
        let policy = UploadPolicy::default();

        assert_eq!(
            policy.validate(&UploadPayload::Files(vec![video(), video()])),
            Err(ValidationError::MixedVideoBatch {
                videos: 2,
                images: 0
            })
        );
    }

    #[test]
    fn every_bad_item_is_reported() {
        let policy = UploadPolicy {
            max_file_bytes: 32,
            ..UploadPolicy::default()
        };
        let UploadPayload::Files(mut files) = photos(4) else {
            unreachable!()
        };
        files.push(MediaItem::new("report.pdf", "application/pdf", vec![1u8; 4]));
        files.push(video());

        let Err(ValidationError::Rejected(rejections)) =
            policy.validate(&UploadPayload::Files(files))
        else {
            panic!("expected per-item rejections");
        };

        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].name, "report.pdf");
        assert!(matches!(
            rejections[0].reason,
            RejectionReason::UnsupportedType { .. }
        ));
        assert_eq!(rejections[1].name, "scene.mp4");
        assert_eq!(
            rejections[1].reason,
            RejectionReason::TooLarge { size: 64, limit: 32 }
        );
    }

    #[test]
    fn empty_batch_is_refused() {
        assert_eq!(
            UploadPolicy::default().validate(&UploadPayload::Files(Vec::new())),
            Err(ValidationError::EmptyPayload)
        );
    }

    #[test]
    fn recordings_must_be_non_empty_video() {
        let policy = UploadPolicy::default();

        let empty = RecordedClip::from_chunks("video/webm", &[]);
        assert_eq!(
            policy.validate(&UploadPayload::Recording(empty)),
            Err(ValidationError::EmptyPayload)
        );

        let clip = RecordedClip::from_chunks("video/webm", &[Bytes::from_static(b"frame")]);
        assert_eq!(
            policy.validate(&UploadPayload::Recording(clip)),
            Ok(MediaKind::Video)
        );

        let audio = RecordedClip::from_chunks("audio/ogg", &[Bytes::from_static(b"frame")]);
        assert!(matches!(
            policy.validate(&UploadPayload::Recording(audio)),
            Err(ValidationError::Rejected(_))
        ));
    }
}
