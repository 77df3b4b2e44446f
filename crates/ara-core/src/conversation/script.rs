//! The fixed conversational script.
//!
//! Every system message the conversation emits comes from here, so the same
//! inputs always produce the same sequence of messages.

use crate::report::MediaKind;
use crate::upload::{MediaItem, UploadPolicy};

/// Messages shown when a conversation starts or restarts.
pub const GREETING: [&str; 2] = [
    "Hello! I'm your accident report assistant.",
    "Please tell me when and where the accident happened and what happened, \
     for example: \"2024-11-15 10:00, Gangnam, car collision\".",
];

pub const ACKNOWLEDGEMENT: &str = "Thank you, I've registered your accident description.";

pub const UPLOAD_INSTRUCTIONS: &str = "You can upload files from your device, \
     or open the camera to record a short video of the scene.";

pub const COMPLETION: &str = "Your accident analysis is ready.";

pub const GUIDE: &str =
    "Open the report to review the full analysis, or restart to describe another accident.";

/// How many photos (or which video) the user should attach.
pub fn media_count_guidance(policy: &UploadPolicy) -> String {
    format!(
        "Please attach {}-{} photos of the scene, or a single video.",
        policy.min_images, policy.max_images
    )
}

/// The messages that follow a successful analysis, in emission order.
pub fn after_analysis(follow_up_question: &str, policy: &UploadPolicy) -> Vec<String> {
    vec![
        ACKNOWLEDGEMENT.to_string(),
        follow_up_question.to_string(),
        media_count_guidance(policy),
        UPLOAD_INSTRUCTIONS.to_string(),
    ]
}

/// The messages that follow a successful finalize, in emission order.
pub fn after_finalize(description: &str) -> Vec<String> {
    vec![
        COMPLETION.to_string(),
        description.to_string(),
        GUIDE.to_string(),
    ]
}

/// The user-side line recorded when a file batch is sent.
pub fn batch_summary(files: &[MediaItem]) -> String {
    let names = files
        .iter()
        .map(|item| item.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match files {
        [single] if single.media_kind() == MediaKind::Video => {
            format!("Attached a video: {names}")
        }
        _ => format!("Attached {} files: {names}", files.len()),
    }
}

pub const RECORDING_SENT: &str = "Sent the recorded video.";
