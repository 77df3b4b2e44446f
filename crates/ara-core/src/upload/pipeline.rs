//! Single-job upload executor.

use super::media::UploadPayload;
use super::policy::UploadPolicy;
use super::progress::UploadProgress;
use crate::backend::ReportBackend;
use crate::credential::Credential;
use crate::error::{AraError, RemoteError, Result, ValidationError};
use crate::report::{MediaKind, ReportHandle};
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use tokio::sync::watch;
use uuid::Uuid;

/// Lifecycle of an upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl UploadStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Bookkeeping for one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadJob {
    pub id: Uuid,
    pub report_id: String,
    pub kind: MediaKind,
    pub item_count: usize,
    pub total_bytes: u64,
    pub status: UploadStatus,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub job_id: Uuid,
    /// Ordered references assigned by the backend.
    pub media_refs: Vec<String>,
    pub kind: MediaKind,
}

/// Validates payloads and transfers them, one job at a time.
///
/// A second upload attempted while a job is pending or in flight is
/// rejected with [`AraError::UploadInProgress`], never queued. Jobs are not
/// retried; a failed job leaves nothing behind but its `Failed` status.
pub struct UploadPipeline {
    backend: Arc<dyn ReportBackend>,
    policy: UploadPolicy,
    progress: UploadProgress,
    job: watch::Sender<Option<UploadJob>>,
}

impl UploadPipeline {
    pub fn new(backend: Arc<dyn ReportBackend>, policy: UploadPolicy) -> Self {
        let (job, _) = watch::channel(None);
        Self {
            backend,
            policy,
            progress: UploadProgress::new(),
            job,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn progress(&self) -> &UploadProgress {
        &self.progress
    }

    /// The most recent job, settled or not.
    pub fn current_job(&self) -> Option<UploadJob> {
        self.job.borrow().clone()
    }

    /// Gives up on the unsettled job, if any, and resets progress.
    ///
    /// The abandoned transfer may still finish later; its outcome then no
    /// longer touches the job record or the progress value.
    pub fn abandon(&self) {
        let mut abandoned = None;
        self.job.send_if_modified(|current| {
            self.progress.detach_jobs();
            match current.as_mut() {
                Some(job) if !job.status.is_settled() => {
                    job.status = UploadStatus::Failed;
                    abandoned = Some(job.id);
                    true
                }
                _ => false,
            }
        });
        if let Some(job_id) = abandoned {
            tracing::info!("[UploadPipeline] Job {} abandoned", job_id);
        }
    }

    /// Runs local validation only.
    pub fn validate(&self, payload: &UploadPayload) -> std::result::Result<MediaKind, ValidationError> {
        self.policy.validate(payload)
    }

    /// Validates and transfers a payload, returning the backend's references.
    ///
    /// Validation happens before anything touches the network. Progress is
    /// published through [`UploadPipeline::progress`] and reset to zero when
    /// the job settles, whatever the outcome.
    pub async fn upload(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        payload: &UploadPayload,
    ) -> Result<UploadReceipt> {
        let kind = self.policy.validate(payload)?;

        let job = UploadJob {
            id: Uuid::new_v4(),
            report_id: report.report_id.clone(),
            kind,
            item_count: payload.item_count(),
            total_bytes: payload.total_bytes(),
            status: UploadStatus::Pending,
        };
        let job_id = job.id;
        let slot = self.claim(job)?;

        tracing::info!(
            "[UploadPipeline] Job {} started: {} {} item(s), {} bytes for report {}",
            job_id,
            payload.item_count(),
            kind,
            payload.total_bytes(),
            report.report_id
        );
        slot.set_status(UploadStatus::InFlight);

        let progress = &slot.progress;
        let result = match payload {
            UploadPayload::Files(files) => {
                self.backend
                    .upload_files(credential, report, files, progress)
                    .await
            }
            UploadPayload::Recording(clip) => {
                self.backend
                    .upload_recording(credential, report, clip, progress)
                    .await
            }
        };

        let outcome = result.and_then(|outcome| {
            if outcome.media_refs.is_empty() {
                Err(RemoteError::transport(
                    "the server did not return any media references",
                ))
            } else {
                Ok(outcome)
            }
        });

        match outcome {
            Ok(outcome) => {
                slot.settle(UploadStatus::Succeeded);
                tracing::info!(
                    "[UploadPipeline] Job {} succeeded with {} reference(s)",
                    job_id,
                    outcome.media_refs.len()
                );
                Ok(UploadReceipt {
                    job_id,
                    media_refs: outcome.media_refs,
                    kind,
                })
            }
            Err(err) => {
                slot.settle(UploadStatus::Failed);
                tracing::warn!("[UploadPipeline] Job {} failed: {}", job_id, err);
                Err(AraError::Upload(err))
            }
        }
    }

    fn claim(&self, job: UploadJob) -> Result<JobSlot<'_>> {
        let job_id = job.id;
        let mut progress = None;
        self.job.send_if_modified(|current| {
            if current.as_ref().is_some_and(|job| !job.status.is_settled()) {
                return false;
            }
            *current = Some(job);
            progress = Some(self.progress.begin_job());
            true
        });

        if let Some(progress) = progress {
            Ok(JobSlot {
                pipeline: self,
                job_id,
                progress,
                settled: false,
            })
        } else {
            tracing::warn!("[UploadPipeline] Rejected upload: a job is already in flight");
            Err(AraError::UploadInProgress)
        }
    }
}

/// Exclusive claim on the pipeline for one job.
///
/// Dropping an unsettled slot (the upload future was dropped) marks the
/// job failed so the pipeline accepts new work. A slot whose job was
/// abandoned or replaced changes nothing.
struct JobSlot<'a> {
    pipeline: &'a UploadPipeline,
    job_id: Uuid,
    progress: UploadProgress,
    settled: bool,
}

impl JobSlot<'_> {
    /// Returns false once the job is no longer this slot's to update.
    fn set_status(&self, status: UploadStatus) -> bool {
        self.pipeline.job.send_if_modified(|current| match current.as_mut() {
            Some(job) if job.id == self.job_id && !job.status.is_settled() => {
                job.status = status;
                true
            }
            _ => false,
        })
    }

    fn settle(mut self, status: UploadStatus) {
        self.settled = true;
        if self.set_status(status) {
            self.pipeline.progress.reset();
        }
    }
}

impl Drop for JobSlot<'_> {
    fn drop(&mut self) {
        if !self.settled && self.set_status(UploadStatus::Failed) {
            self.pipeline.progress.reset();
        }
    }
}
