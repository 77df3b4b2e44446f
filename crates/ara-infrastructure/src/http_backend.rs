//! HTTP implementation of the report backend.
//!
//! # Endpoints
//!
//! - `POST {base}/api/reports/analyze`: JSON `{description}`
//! - `POST {base}/api/reports/{report_id}/media`: multipart `ownerId` + `files`
//! - `POST {base}/api/reports/{report_id}/finalize`: JSON `{mediaRefs, mediaKind}`
//!
//! Every request carries the caller's credential as a bearer token. Upload
//! bodies are streamed in `chunk_bytes` pieces, and progress is reported as
//! each piece is handed to the transport.

use ara_core::backend::{AnalysisOutcome, FinalizeOutcome, MediaUploadOutcome, ReportBackend};
use ara_core::config::BackendConfig;
use ara_core::credential::Credential;
use ara_core::error::{AraError, RemoteError, Result};
use ara_core::report::{MediaKind, ReportHandle};
use ara_core::upload::{MediaItem, RecordedClip, UploadProgress};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest<'a> {
    media_refs: &'a [String],
    media_kind: MediaKind,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// `reqwest`-based [`ReportBackend`].
pub struct HttpReportBackend {
    client: Client,
    base_url: String,
    chunk_bytes: usize,
}

impl HttpReportBackend {
    /// Creates a backend for `config.base_url`, streaming uploads in
    /// `chunk_bytes` pieces.
    ///
    /// # Errors
    ///
    /// Returns `AraError::Config` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig, chunk_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AraError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn upload_items(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        items: &[MediaItem],
        progress: &UploadProgress,
    ) -> std::result::Result<MediaUploadOutcome, RemoteError> {
        let total: u64 = items.iter().map(MediaItem::size).sum();
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = Form::new().text("ownerId", report.owner_id.to_string());
        for item in items {
            let body = self.progress_body(item.data.clone(), sent.clone(), total, progress.clone());
            let part = Part::stream_with_length(body, item.size())
                .file_name(item.name.clone())
                .mime_str(&item.mime_type)
                .map_err(|e| {
                    RemoteError::transport(format!(
                        "Invalid MIME type '{}' for {}: {}",
                        item.mime_type, item.name, e
                    ))
                })?;
            form = form.part("files", part);
        }

        tracing::info!(
            "[HttpReportBackend] Uploading {} file(s), {} bytes for report {}",
            items.len(),
            total,
            report.report_id
        );
        let response = self
            .client
            .post(self.url(&format!("/api/reports/{}/media", report.report_id)))
            .header(AUTHORIZATION, credential.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let outcome: MediaUploadOutcome = read_json(response, "Upload").await?;
        progress.report(total, total);
        Ok(outcome)
    }

    /// Wraps `data` in a streamed body that reports progress per chunk.
    fn progress_body(
        &self,
        data: Bytes,
        sent: Arc<AtomicU64>,
        total: u64,
        progress: UploadProgress,
    ) -> Body {
        let chunk_bytes = self.chunk_bytes;
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(chunk_bytes)
            .map(|start| data.slice(start..(start + chunk_bytes).min(data.len())))
            .collect();

        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let transferred =
                sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            progress.report(transferred, total);
            Ok::<Bytes, std::io::Error>(chunk)
        }));
        Body::wrap_stream(stream)
    }
}

#[async_trait]
impl ReportBackend for HttpReportBackend {
    async fn analyze(
        &self,
        credential: &Credential,
        description: &str,
    ) -> std::result::Result<AnalysisOutcome, RemoteError> {
        tracing::debug!("[HttpReportBackend] POST /api/reports/analyze");
        let response = self
            .client
            .post(self.url("/api/reports/analyze"))
            .header(AUTHORIZATION, credential.bearer())
            .json(&AnalyzeRequest { description })
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "Analysis").await
    }

    async fn upload_files(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        files: &[MediaItem],
        progress: &UploadProgress,
    ) -> std::result::Result<MediaUploadOutcome, RemoteError> {
        self.upload_items(credential, report, files, progress).await
    }

    async fn upload_recording(
        &self,
        credential: &Credential,
        report: &ReportHandle,
        clip: &RecordedClip,
        progress: &UploadProgress,
    ) -> std::result::Result<MediaUploadOutcome, RemoteError> {
        let item = clip.to_media_item();
        self.upload_items(credential, report, std::slice::from_ref(&item), progress)
            .await
    }

    async fn finalize(
        &self,
        credential: &Credential,
        report_id: &str,
        media_refs: &[String],
        media_kind: MediaKind,
    ) -> std::result::Result<FinalizeOutcome, RemoteError> {
        tracing::debug!(
            "[HttpReportBackend] POST /api/reports/{}/finalize ({} {} reference(s))",
            report_id,
            media_refs.len(),
            media_kind
        );
        let response = self
            .client
            .post(self.url(&format!("/api/reports/{}/finalize", report_id)))
            .header(AUTHORIZATION, credential.bearer())
            .json(&FinalizeRequest {
                media_refs,
                media_kind,
            })
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "Report generation").await
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    tracing::warn!("[HttpReportBackend] Transport failure: {}", err);
    RemoteError::transport(format!("Could not reach the server: {}", err))
}

/// Decodes a success body, or maps a non-success status to a [`RemoteError`].
async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &str,
) -> std::result::Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body, operation, status.as_u16());
        tracing::warn!(
            "[HttpReportBackend] {} failed with HTTP {}: {}",
            operation,
            status.as_u16(),
            message
        );
        return Err(RemoteError::status(status.as_u16(), message));
    }

    response.json::<T>().await.map_err(|e| {
        RemoteError::status(
            status.as_u16(),
            format!("{} returned an unreadable response: {}", operation, e),
        )
    })
}

/// The body's `message` field, or a generic line naming the operation.
fn error_message(body: &str, operation: &str, status: u16) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("{} failed (HTTP {})", operation, status))
}
