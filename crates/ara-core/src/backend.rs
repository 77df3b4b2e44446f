//! Report backend contract.
//!
//! Defines the interface the conversation uses to reach the remote analysis
//! and report service, decoupling orchestration from the transport.

use crate::credential::Credential;
use crate::error::RemoteError;
use crate::report::{MediaKind, ReportAggregate, ReportHandle};
use crate::upload::{MediaItem, RecordedClip, UploadProgress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response of the analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub follow_up_question: String,
    pub report: ReportHandle,
}

/// Response of a media upload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadOutcome {
    /// References in the order the backend assigned them.
    pub media_refs: Vec<String>,
}

/// Response of the finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub description: String,
    pub report: ReportAggregate,
}

/// An abstract client for the report backend.
///
/// Every call receives the credential explicitly. Errors carry a
/// human-readable message taken from the response body when possible.
///
/// # Implementation Notes
///
/// Upload implementations must report transferred bytes to `progress` as the
/// body is handed to the transport, and must return either the complete
/// reference list or an error, never a partial list.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Analyzes a free-text accident description and creates a report.
    async fn analyze(
        &self,
        credential: &Credential,
        description: &str,
    ) -> Result<AnalysisOutcome, RemoteError>;

    /// Uploads a batch of files for a report.
    async fn upload_files(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        files: &[MediaItem],
        progress: &UploadProgress,
    ) -> Result<MediaUploadOutcome, RemoteError>;

    /// Uploads a single camera recording for a report.
    async fn upload_recording(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        clip: &RecordedClip,
        progress: &UploadProgress,
    ) -> Result<MediaUploadOutcome, RemoteError>;

    /// Generates the final report from the attached media.
    async fn finalize(
        &self,
        credential: &Credential,
        report_id: &str,
        media_refs: &[String],
        media_kind: MediaKind,
    ) -> Result<FinalizeOutcome, RemoteError>;
}
