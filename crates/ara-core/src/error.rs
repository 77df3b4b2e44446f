//! Error types for the accident report assistant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single media item was refused by local validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The media type is neither an image nor a video.
    #[error("unsupported file type '{mime_type}' (only images and videos are accepted)")]
    UnsupportedType { mime_type: String },

    /// The item exceeds the per-file size ceiling.
    #[error("file is too large ({size} bytes, limit is {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    /// The item carries no data.
    #[error("file is empty")]
    Empty,
}

/// A media item refused by local validation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRejection {
    pub name: String,
    pub reason: RejectionReason,
}

impl std::fmt::Display for ItemRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

fn join_rejections(rejections: &[ItemRejection]) -> String {
    rejections
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Input problems detected locally. These never reach the network.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Please describe the accident before sending.")]
    EmptyInput,

    #[error("No files were selected.")]
    EmptyPayload,

    #[error("{} file(s) cannot be uploaded: {}", .0.len(), join_rejections(.0))]
    Rejected(Vec<ItemRejection>),

    #[error("Please attach at least {min} photos (got {count}).")]
    TooFewImages { count: usize, min: usize },

    #[error("Please attach at most {max} photos (got {count}).")]
    TooManyImages { count: usize, max: usize },

    /// Any batch holding a video other than exactly one video and nothing
    /// else: a video with photos, or two or more videos.
    #[error("A video must be uploaded on its own (got {videos} video(s) and {images} photo(s)).")]
    MixedVideoBatch { videos: usize, images: usize },
}

/// Camera acquisition and recording failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceError {
    #[error("Camera permission was denied.")]
    PermissionDenied,

    #[error("No camera is available on this device.")]
    NotFound,

    #[error("The camera is busy.")]
    Busy,

    #[error("Camera error: {0}")]
    Other(String),
}

/// A rejected or failed call to the report backend.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    /// HTTP status when the server answered, `None` for transport failures.
    pub status: Option<u16>,
    /// Human-readable reason, taken from the response body when available.
    pub message: String,
}

impl RemoteError {
    /// Creates an error for a non-success HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an error for a failure that never produced a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true when the server was never reached.
    pub fn is_transport(&self) -> bool {
        self.status.is_none()
    }
}

/// A shared error type for the whole assistant.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AraError {
    /// Local input validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The analysis call was rejected or could not be delivered
    #[error("Analysis failed: {0}")]
    Analysis(RemoteError),

    /// A media upload was rejected or could not be delivered
    #[error("Upload failed: {0}")]
    Upload(RemoteError),

    /// The finalize call was rejected or could not be delivered
    #[error("Report generation failed: {0}")]
    Finalize(RemoteError),

    /// Camera unavailable or refused
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// No credential is available for backend calls
    #[error("No valid credential is available")]
    Unauthenticated,

    /// A second upload was attempted while one is in flight
    #[error("An upload is already in progress")]
    UploadInProgress,

    /// An event was fired in a state that does not accept it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AraError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Analysis(_) | Self::Upload(_) | Self::Finalize(_)
        )
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }

    /// Text shown to the user in the conversation when this error surfaces.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Analysis(err) => {
                format!("Sorry, I couldn't analyze your description: {}", err.message)
            }
            Self::Upload(err) => format!("The upload failed: {}", err.message),
            Self::Finalize(err) => {
                format!("Sorry, the report could not be generated: {}", err.message)
            }
            Self::Device(DeviceError::NotFound) => {
                "No camera is available. You can still upload photos or a video file.".to_string()
            }
            Self::Device(err) => err.to_string(),
            Self::Unauthenticated => "Please sign in before continuing.".to_string(),
            Self::UploadInProgress => {
                "An upload is already in progress. Please wait for it to finish.".to_string()
            }
            other => format!("Something went wrong: {other}"),
        }
    }
}

impl From<std::io::Error> for AraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AraError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, AraError>`.
pub type Result<T> = std::result::Result<T, AraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_lists_every_item() {
        let err = ValidationError::Rejected(vec![
            ItemRejection {
                name: "notes.pdf".to_string(),
                reason: RejectionReason::UnsupportedType {
                    mime_type: "application/pdf".to_string(),
                },
            },
            ItemRejection {
                name: "huge.mp4".to_string(),
                reason: RejectionReason::TooLarge {
                    size: 200,
                    limit: 100,
                },
            },
        ]);

        let text = err.to_string();
        assert!(text.starts_with("2 file(s) cannot be uploaded"));
        assert!(text.contains("notes.pdf: unsupported file type 'application/pdf'"));
        assert!(text.contains("huge.mp4: file is too large"));
    }

    #[test]
    fn remote_errors_render_server_message() {
        let err = AraError::Analysis(RemoteError::status(500, "model overloaded"));
        assert!(err.is_remote());
        assert_eq!(
            err.user_message(),
            "Sorry, I couldn't analyze your description: model overloaded"
        );
    }

    #[test]
    fn missing_camera_points_to_file_upload() {
        let err = AraError::from(DeviceError::NotFound);
        assert!(err.is_device());
        assert!(err.user_message().contains("upload photos"));
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: AraError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        match err {
            AraError::Io { message } => assert!(message.contains("NotFound")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
