//! Conversation phase controller.
//!
//! `ConversationController` owns the conversation phase and drives it from
//! user intents: it calls the backend, runs uploads, operates the camera
//! state machine and writes every user-visible message to the timeline.
//!
//! # Concurrency
//!
//! Intents may be fired concurrently from any front-end. Two busy flags keep
//! duplicates out without blocking:
//!
//! - `primary_call`: an analysis or finalize call is outstanding
//! - `media_flow`: a batch or recording upload is being handled
//!
//! A duplicate intent returns [`Outcome::Ignored`] and leaves no trace.
//!
//! Every running intent remembers the epoch it started in. `restart` moves
//! the epoch forward, so results that arrive afterwards are discarded and
//! their messages never reach the new timeline. Busy flags are held per
//! epoch as well: a call that never returns blocks only the conversation it
//! was made in.

use crate::busy::BusyFlag;
use crate::outcome::{IgnoreReason, Outcome};
use ara_core::backend::ReportBackend;
use ara_core::capture::{CameraDevice, CaptureMachine, RecordingState};
use ara_core::config::AppConfig;
use ara_core::conversation::{
    ChatMessage, ConversationPhase, MessageSender, MessageTimeline, TimelineView, script,
};
use ara_core::credential::{Credential, CredentialProvider};
use ara_core::error::{AraError, DeviceError, Result, ValidationError};
use ara_core::report::{ReportAggregate, ReportHandle};
use ara_core::upload::{
    MediaItem, UploadJob, UploadPayload, UploadPipeline, UploadPolicy, UploadReceipt,
};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Per-conversation state guarded together with its epoch.
#[derive(Default)]
struct SessionState {
    epoch: u64,
    report: Option<ReportAggregate>,
    /// Set once the camera reported `NotFound`; cleared by restart.
    camera_disabled: bool,
}

/// Orchestrates one accident-report conversation.
///
/// Phases only move forward (`Intake → MediaPending → Complete`) until
/// [`ConversationController::restart`] returns to `Intake`.
pub struct ConversationController {
    backend: Arc<dyn ReportBackend>,
    credentials: Arc<dyn CredentialProvider>,
    timeline: Arc<MessageTimeline>,
    uploads: UploadPipeline,
    capture: Mutex<CaptureMachine>,
    capture_status: watch::Receiver<RecordingState>,
    session: Mutex<SessionState>,
    phase: watch::Sender<ConversationPhase>,
    primary_call: BusyFlag,
    media_flow: BusyFlag,
}

impl ConversationController {
    /// Creates a controller in `Intake` with an empty timeline.
    ///
    /// Call [`ConversationController::start`] to show the greeting.
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn ReportBackend>,
        credentials: Arc<dyn CredentialProvider>,
        camera: Arc<dyn CameraDevice>,
    ) -> Self {
        let capture = CaptureMachine::new(camera, config.capture.slice_interval());
        let capture_status = capture.subscribe();
        let (phase, _) = watch::channel(ConversationPhase::Intake);

        Self {
            uploads: UploadPipeline::new(backend.clone(), config.upload.clone()),
            backend,
            credentials,
            timeline: Arc::new(MessageTimeline::new(config.timeline.compose_delay())),
            capture: Mutex::new(capture),
            capture_status,
            session: Mutex::new(SessionState::default()),
            phase,
            primary_call: BusyFlag::default(),
            media_flow: BusyFlag::default(),
        }
    }

    /// Emits the greeting for the current conversation.
    pub async fn start(&self) {
        let epoch = self.session.lock().await.epoch;
        tracing::info!("[ConversationController] Conversation started");
        self.say(epoch, script::GREETING).await;
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Submits the free-text accident description (`Intake` only).
    ///
    /// On success the report is created, four system messages are emitted
    /// and the phase advances to `MediaPending`. On failure one error message
    /// is emitted and the phase stays `Intake` so the user can try again.
    pub async fn submit_text(&self, text: &str) -> Result<Outcome> {
        if let Some(outcome) = self.ignore_unless(ConversationPhase::Intake) {
            return Ok(outcome);
        }
        let epoch = match self.epoch_in(ConversationPhase::Intake).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        let Some(_call) = self.primary_call.claim(epoch) else {
            tracing::debug!("[ConversationController] Submit ignored: a call is pending");
            return Ok(Outcome::ignored(IgnoreReason::CallPending));
        };

        let description = text.trim();
        if description.is_empty() {
            return self.fail(epoch, ValidationError::EmptyInput.into()).await;
        }
        let Some(credential) = self.credentials.current() else {
            return self.fail(epoch, AraError::Unauthenticated).await;
        };

        self.timeline
            .append_for(epoch, MessageSender::User, description)
            .await;
        tracing::info!(
            "[ConversationController] Analyzing description ({} chars)",
            description.chars().count()
        );

        let analysis = {
            let _thinking = self.timeline.thinking(epoch);
            self.backend.analyze(&credential, description).await
        };
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(err) => return self.fail(epoch, AraError::Analysis(err)).await,
        };

        {
            let mut session = self.session.lock().await;
            if session.epoch != epoch {
                return Ok(Outcome::ignored(IgnoreReason::Stale));
            }
            session.report = Some(ReportAggregate::from_handle(analysis.report.clone()));
        }
        tracing::info!(
            "[ConversationController] Report {} created for owner {}",
            analysis.report.report_id,
            analysis.report.owner_id
        );

        let lines = script::after_analysis(&analysis.follow_up_question, self.uploads.policy());
        if !self.say(epoch, lines).await {
            return Ok(Outcome::ignored(IgnoreReason::Stale));
        }
        Ok(self.advance(epoch, ConversationPhase::MediaPending).await)
    }

    /// Uploads a batch of files and finalizes the report (`MediaPending` only).
    ///
    /// The batch is validated locally first; an invalid batch produces one
    /// error message and no network traffic.
    pub async fn upload_batch(&self, files: Vec<MediaItem>) -> Result<Outcome> {
        if let Some(outcome) = self.ignore_unless(ConversationPhase::MediaPending) {
            return Ok(outcome);
        }
        let epoch = match self.epoch_in(ConversationPhase::MediaPending).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        let Some(_flow) = self.media_flow.claim(epoch) else {
            tracing::debug!("[ConversationController] Batch ignored: media flow active");
            return Ok(Outcome::ignored(IgnoreReason::MediaFlowActive));
        };
        let capture = self.capture_state();
        if matches!(capture, RecordingState::Recording | RecordingState::Uploading) {
            return Ok(Outcome::ignored(IgnoreReason::CaptureState(capture)));
        }

        let summary = script::batch_summary(&files);
        let payload = UploadPayload::Files(files);
        if let Err(err) = self.uploads.validate(&payload) {
            return self.fail(epoch, err.into()).await;
        }
        let (credential, report) = match self.upload_context(epoch).await {
            Ok(context) => context,
            Err(err) => return self.fail(epoch, err).await,
        };

        self.timeline
            .append_for(epoch, MessageSender::User, summary)
            .await;

        let receipt = match self.uploads.upload(&credential, &report, &payload).await {
            Ok(receipt) => receipt,
            Err(err) => return self.fail(epoch, err).await,
        };
        self.finalize_report(epoch, &credential, receipt).await
    }

    /// Opens the camera preview (`MediaPending` only).
    ///
    /// A clip under review is discarded. When no camera exists the recording
    /// path stays disabled until restart.
    pub async fn open_camera(&self) -> Result<Outcome> {
        let epoch = match self.epoch_in(ConversationPhase::MediaPending).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        if let Some(outcome) = self.ignore_during_media_flow(epoch) {
            return Ok(outcome);
        }
        if self.session.lock().await.camera_disabled {
            return self.fail(epoch, DeviceError::NotFound.into()).await;
        }

        let result = self.capture.lock().await.activate().await;
        self.device_result(epoch, result).await
    }

    /// Starts recording, opening the camera first when it is off.
    pub async fn start_capture(&self) -> Result<Outcome> {
        let epoch = match self.epoch_in(ConversationPhase::MediaPending).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        if let Some(outcome) = self.ignore_during_media_flow(epoch) {
            return Ok(outcome);
        }
        if self.session.lock().await.camera_disabled {
            return self.fail(epoch, DeviceError::NotFound.into()).await;
        }

        let result = {
            let mut capture = self.capture.lock().await;
            match capture.state() {
                RecordingState::Idle => match capture.activate().await {
                    Ok(()) => capture.start_recording(),
                    Err(err) => Err(err),
                },
                RecordingState::Streaming => capture.start_recording(),
                other => return Ok(Outcome::ignored(IgnoreReason::CaptureState(other))),
            }
        };
        self.device_result(epoch, result).await
    }

    /// Stops recording and moves to review. The camera is released.
    pub async fn stop_capture(&self) -> Result<Outcome> {
        let epoch = self.session.lock().await.epoch;
        let result = {
            let mut capture = self.capture.lock().await;
            let state = capture.state();
            if state != RecordingState::Recording {
                return Ok(Outcome::ignored(IgnoreReason::CaptureState(state)));
            }
            capture.stop_recording().await
        };
        match result {
            Ok(()) => Ok(Outcome::Applied),
            Err(err) => self.fail(epoch, err).await,
        }
    }

    /// Discards the reviewed clip and reopens the camera.
    pub async fn retake(&self) -> Result<Outcome> {
        let epoch = match self.epoch_in(ConversationPhase::MediaPending).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        let result = {
            let mut capture = self.capture.lock().await;
            let state = capture.state();
            if state != RecordingState::Reviewing {
                return Ok(Outcome::ignored(IgnoreReason::CaptureState(state)));
            }
            capture.retake().await
        };
        self.device_result(epoch, result).await
    }

    /// Closes the camera from any state except `Uploading`, dropping any
    /// buffered fragments or clip.
    pub async fn close_camera(&self) -> Outcome {
        let mut capture = self.capture.lock().await;
        match capture.state() {
            RecordingState::Uploading => {
                Outcome::ignored(IgnoreReason::CaptureState(RecordingState::Uploading))
            }
            _ => {
                capture.teardown();
                Outcome::Applied
            }
        }
    }

    /// Uploads the reviewed recording and finalizes the report as a video.
    ///
    /// A failed upload keeps the clip in review so it can be sent again.
    pub async fn upload_recording(&self) -> Result<Outcome> {
        if let Some(outcome) = self.ignore_unless(ConversationPhase::MediaPending) {
            return Ok(outcome);
        }
        let epoch = match self.epoch_in(ConversationPhase::MediaPending).await {
            Ok(epoch) => epoch,
            Err(outcome) => return Ok(outcome),
        };
        let Some(_flow) = self.media_flow.claim(epoch) else {
            tracing::debug!("[ConversationController] Recording ignored: media flow active");
            return Ok(Outcome::ignored(IgnoreReason::MediaFlowActive));
        };
        let state = self.capture_state();
        if state != RecordingState::Reviewing {
            return Ok(Outcome::ignored(IgnoreReason::CaptureState(state)));
        }
        let (credential, report) = match self.upload_context(epoch).await {
            Ok(context) => context,
            Err(err) => return self.fail(epoch, err).await,
        };

        let clip = match self.capture.lock().await.begin_upload() {
            Ok(clip) => clip,
            Err(_) => {
                return Ok(Outcome::ignored(IgnoreReason::CaptureState(
                    self.capture_state(),
                )));
            }
        };
        self.timeline
            .append_for(epoch, MessageSender::User, script::RECORDING_SENT)
            .await;

        let result = self
            .uploads
            .upload(&credential, &report, &UploadPayload::Recording(clip))
            .await;
        {
            // After a restart the camera belongs to the new conversation.
            let session = self.session.lock().await;
            if session.epoch == epoch {
                self.capture.lock().await.finish_upload(result.is_ok());
            }
        }

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => return self.fail(epoch, err).await,
        };
        self.finalize_report(epoch, &credential, receipt).await
    }

    /// The finished report (`Complete` only).
    pub async fn view_report(&self) -> Option<ReportAggregate> {
        if self.phase() != ConversationPhase::Complete {
            return None;
        }
        self.session.lock().await.report.clone()
    }

    /// Reports a failure that happened before an intent could be formed,
    /// such as an attachment that could not be read, as one error message.
    pub async fn reject_input(&self, error: AraError) -> Result<Outcome> {
        let epoch = self.session.lock().await.epoch;
        self.fail(epoch, error).await
    }

    /// Returns to `Intake` from any phase and replays the greeting.
    ///
    /// The camera is released, the report and timeline are cleared and any
    /// upload job is abandoned. Calls still running from before no longer
    /// block new intents and are discarded when they return.
    pub async fn restart(&self) {
        tracing::info!("[ConversationController] Restarting conversation");
        self.capture.lock().await.teardown();

        let epoch = {
            let mut session = self.session.lock().await;
            session.epoch += 1;
            session.report = None;
            session.camera_disabled = false;
            self.phase.send_replace(ConversationPhase::Intake);
            session.epoch
        };

        self.uploads.abandon();
        self.timeline.reset_to(epoch).await;
        self.say(epoch, script::GREETING).await;
    }

    /// Releases the camera. Call before the front-end goes away.
    pub async fn shutdown(&self) {
        tracing::info!("[ConversationController] Shutting down");
        self.capture.lock().await.teardown();
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn phase(&self) -> ConversationPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ConversationPhase> {
        self.phase.subscribe()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.timeline.snapshot()
    }

    pub fn timeline_view(&self) -> TimelineView {
        self.timeline.view()
    }

    pub fn subscribe_timeline(&self) -> watch::Receiver<TimelineView> {
        self.timeline.subscribe()
    }

    pub fn capture_state(&self) -> RecordingState {
        *self.capture_status.borrow()
    }

    pub fn subscribe_capture(&self) -> watch::Receiver<RecordingState> {
        self.capture_status.clone()
    }

    /// Current upload progress, 0 to 100.
    pub fn upload_progress(&self) -> u8 {
        self.uploads.progress().current()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.uploads.progress().subscribe()
    }

    pub fn current_upload(&self) -> Option<UploadJob> {
        self.uploads.current_job()
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        self.uploads.policy()
    }

    /// The report as known so far, in any phase.
    pub async fn report(&self) -> Option<ReportAggregate> {
        self.session.lock().await.report.clone()
    }

    pub async fn camera_disabled(&self) -> bool {
        self.session.lock().await.camera_disabled
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Cheap pre-check so intents for another phase never claim a flag.
    fn ignore_unless(&self, expected: ConversationPhase) -> Option<Outcome> {
        let phase = self.phase();
        (phase != expected).then(|| Outcome::ignored(IgnoreReason::WrongPhase(phase)))
    }

    fn ignore_during_media_flow(&self, epoch: u64) -> Option<Outcome> {
        self.media_flow
            .is_held_for(epoch)
            .then(|| Outcome::ignored(IgnoreReason::MediaFlowActive))
    }

    /// The current epoch, provided the phase is `expected`.
    async fn epoch_in(&self, expected: ConversationPhase) -> std::result::Result<u64, Outcome> {
        let session = self.session.lock().await;
        let phase = self.phase();
        if phase == expected {
            Ok(session.epoch)
        } else {
            Err(Outcome::ignored(IgnoreReason::WrongPhase(phase)))
        }
    }

    async fn upload_context(&self, epoch: u64) -> Result<(Credential, ReportHandle)> {
        let report = {
            let session = self.session.lock().await;
            if session.epoch != epoch {
                return Err(AraError::invalid_state("the conversation was restarted"));
            }
            session.report.as_ref().map(ReportAggregate::handle)
        };
        let report =
            report.ok_or_else(|| AraError::internal("no report exists for this conversation"))?;
        let credential = self
            .credentials
            .current()
            .ok_or(AraError::Unauthenticated)?;
        Ok((credential, report))
    }

    async fn finalize_report(
        &self,
        epoch: u64,
        credential: &Credential,
        receipt: UploadReceipt,
    ) -> Result<Outcome> {
        let Some(_call) = self.primary_call.claim(epoch) else {
            return Ok(Outcome::ignored(IgnoreReason::CallPending));
        };

        let report_id = {
            let mut session = self.session.lock().await;
            if session.epoch != epoch {
                return Ok(Outcome::ignored(IgnoreReason::Stale));
            }
            session.report.as_mut().map(|report| {
                report.attach_media(receipt.media_refs.clone(), receipt.kind);
                report.report_id.clone()
            })
        };
        let Some(report_id) = report_id else {
            return self
                .fail(epoch, AraError::internal("no report to finalize"))
                .await;
        };

        tracing::info!(
            "[ConversationController] Finalizing report {} with {} {} reference(s)",
            report_id,
            receipt.media_refs.len(),
            receipt.kind
        );
        let finalized = {
            let _thinking = self.timeline.thinking(epoch);
            self.backend
                .finalize(credential, &report_id, &receipt.media_refs, receipt.kind)
                .await
        };
        let finalized = match finalized {
            Ok(finalized) => finalized,
            Err(err) => return self.fail(epoch, AraError::Finalize(err)).await,
        };

        {
            let mut session = self.session.lock().await;
            if session.epoch != epoch {
                return Ok(Outcome::ignored(IgnoreReason::Stale));
            }
            if let Some(report) = session.report.as_mut() {
                report.merge_finalized(finalized.description.clone(), &finalized.report);
            }
        }

        if !self
            .say(epoch, script::after_finalize(&finalized.description))
            .await
        {
            return Ok(Outcome::ignored(IgnoreReason::Stale));
        }
        Ok(self.advance(epoch, ConversationPhase::Complete).await)
    }

    async fn device_result(&self, epoch: u64, result: Result<()>) -> Result<Outcome> {
        match result {
            Ok(()) => Ok(Outcome::Applied),
            Err(err) => {
                if err == AraError::Device(DeviceError::NotFound) {
                    let mut session = self.session.lock().await;
                    if session.epoch == epoch {
                        tracing::warn!(
                            "[ConversationController] No camera found, recording disabled until restart"
                        );
                        session.camera_disabled = true;
                    }
                }
                self.fail(epoch, err).await
            }
        }
    }

    /// Emits system lines in order. Returns false once the epoch is stale.
    async fn say<I, S>(&self, epoch: u64, lines: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            if self
                .timeline
                .append_for(epoch, MessageSender::System, line)
                .await
                .is_none()
            {
                return false;
            }
        }
        true
    }

    /// Surfaces `error` as exactly one error message and returns it.
    async fn fail<T>(&self, epoch: u64, error: AraError) -> Result<T> {
        tracing::warn!("[ConversationController] {}", error);
        self.timeline
            .append_for(epoch, MessageSender::Error, error.user_message())
            .await;
        Err(error)
    }

    async fn advance(&self, epoch: u64, next: ConversationPhase) -> Outcome {
        let session = self.session.lock().await;
        if session.epoch != epoch {
            return Outcome::ignored(IgnoreReason::Stale);
        }
        let current = self.phase();
        if !current.can_advance_to(next) {
            tracing::warn!(
                "[ConversationController] Refused phase change {} -> {}",
                current,
                next
            );
            return Outcome::ignored(IgnoreReason::WrongPhase(current));
        }
        self.phase.send_replace(next);
        tracing::info!("[ConversationController] Phase {} -> {}", current, next);
        Outcome::Applied
    }
}
