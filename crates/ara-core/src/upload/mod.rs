//! Upload domain module.
//!
//! - `media`: Upload payloads (`MediaItem`, `RecordedClip`, `UploadPayload`)
//! - `policy`: Local validation rules (`UploadPolicy`)
//! - `progress`: Monotonic, throttled progress reporting (`UploadProgress`)
//! - `pipeline`: The single-job upload executor (`UploadPipeline`)

mod media;
mod pipeline;
mod policy;
mod progress;

pub use media::{MediaItem, RecordedClip, UploadPayload};
pub use pipeline::{UploadJob, UploadPipeline, UploadReceipt, UploadStatus};
pub use policy::{DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_IMAGES, DEFAULT_MIN_IMAGES, UploadPolicy};
pub use progress::UploadProgress;
