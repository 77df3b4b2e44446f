//! End-to-end conversation scenarios against in-memory fakes.

use ara_application::{ConversationController, IgnoreReason, Outcome};
use ara_core::backend::{AnalysisOutcome, FinalizeOutcome, MediaUploadOutcome, ReportBackend};
use ara_core::capture::{CameraDevice, DeviceStream, MediaRecorder, RecordingState};
use ara_core::config::AppConfig;
use ara_core::conversation::{ConversationPhase, MessageSender, script};
use ara_core::credential::{Credential, StaticCredentialProvider};
use ara_core::error::{AraError, DeviceError, RemoteError, ValidationError};
use ara_core::report::{MediaKind, ReportAggregate, ReportHandle};
use ara_core::upload::{MediaItem, RecordedClip, UploadProgress};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

const FOLLOW_UP: &str = "Was anyone injured?";
const DESCRIPTION: &str = "Rear-end collision at low speed, no injuries.";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeBackend {
    analyze_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    finalize_calls: AtomicUsize,
    analyze_gate: Option<Arc<Notify>>,
    /// The next call of that kind never returns.
    stall_next_analyze: AtomicBool,
    stall_next_upload: AtomicBool,
    fail_analyze: AtomicBool,
    fail_upload: AtomicBool,
    fail_finalize: AtomicBool,
    finalized_kinds: Mutex<Vec<MediaKind>>,
}

impl FakeBackend {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            analyze_gate: Some(gate),
            ..Self::default()
        }
    }

    fn network_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
            + self.finalize_calls.load(Ordering::SeqCst)
    }

    async fn transfer(
        &self,
        count: usize,
        progress: &UploadProgress,
    ) -> Result<MediaUploadOutcome, RemoteError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        progress.report(40, 100);
        if self.stall_next_upload.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(RemoteError::transport("connection reset by peer"));
        }
        progress.report(100, 100);
        Ok(MediaUploadOutcome {
            media_refs: (0..count).map(|i| format!("https://cdn.test/R1/{i}")).collect(),
        })
    }
}

#[async_trait]
impl ReportBackend for FakeBackend {
    async fn analyze(
        &self,
        _credential: &Credential,
        _description: &str,
    ) -> Result<AnalysisOutcome, RemoteError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_next_analyze.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.analyze_gate {
            gate.notified().await;
        }
        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(RemoteError::status(500, "analysis service unavailable"));
        }
        Ok(AnalysisOutcome {
            follow_up_question: FOLLOW_UP.to_string(),
            report: ReportHandle {
                report_id: "R1".to_string(),
                owner_id: 7,
            },
        })
    }

    async fn upload_files(
        &self,
        _credential: &Credential,
        _report: &ReportHandle,
        files: &[MediaItem],
        progress: &UploadProgress,
    ) -> Result<MediaUploadOutcome, RemoteError> {
        self.transfer(files.len(), progress).await
    }

    async fn upload_recording(
        &self,
        _credential: &Credential,
        _report: &ReportHandle,
        _clip: &RecordedClip,
        progress: &UploadProgress,
    ) -> Result<MediaUploadOutcome, RemoteError> {
        self.transfer(1, progress).await
    }

    async fn finalize(
        &self,
        _credential: &Credential,
        report_id: &str,
        media_refs: &[String],
        media_kind: MediaKind,
    ) -> Result<FinalizeOutcome, RemoteError> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(RemoteError::status(502, "report generator unavailable"));
        }
        self.finalized_kinds.lock().unwrap().push(media_kind);
        Ok(FinalizeOutcome {
            description: DESCRIPTION.to_string(),
            report: ReportAggregate {
                report_id: report_id.to_string(),
                owner_id: 7,
                description: Some(DESCRIPTION.to_string()),
                media_refs: media_refs.to_vec(),
                media_kind,
            },
        })
    }
}

#[derive(Default)]
struct FakeCamera {
    live_streams: Arc<AtomicUsize>,
    acquisitions: AtomicUsize,
    next_error: Mutex<Option<DeviceError>>,
}

impl FakeCamera {
    fn fail_next(&self, err: DeviceError) {
        *self.next_error.lock().unwrap() = Some(err);
    }

    fn live(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn acquire(&self) -> Result<Box<dyn DeviceStream>, DeviceError> {
        if let Some(err) = self.next_error.lock().unwrap().take() {
            return Err(err);
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            live: true,
            live_streams: self.live_streams.clone(),
        }))
    }
}

struct FakeStream {
    live: bool,
    live_streams: Arc<AtomicUsize>,
}

impl DeviceStream for FakeStream {
    fn start_recorder(
        &mut self,
        _slice: Duration,
        sink: mpsc::UnboundedSender<Bytes>,
    ) -> Result<Box<dyn MediaRecorder>, DeviceError> {
        sink.send(Bytes::from_static(b"frame-1")).ok();
        Ok(Box::new(FakeRecorder { sink: Some(sink) }))
    }

    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

struct FakeRecorder {
    sink: Option<mpsc::UnboundedSender<Bytes>>,
}

impl MediaRecorder for FakeRecorder {
    fn mime_type(&self) -> &str {
        "video/webm"
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.send(Bytes::from_static(b"frame-2")).ok();
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    controller: Arc<ConversationController>,
    backend: Arc<FakeBackend>,
    camera: Arc<FakeCamera>,
}

async fn harness_with(backend: FakeBackend, credential: Option<Credential>) -> Harness {
    let backend = Arc::new(backend);
    let camera = Arc::new(FakeCamera::default());
    let controller = Arc::new(ConversationController::new(
        &AppConfig::default(),
        backend.clone(),
        Arc::new(StaticCredentialProvider::new(credential)),
        camera.clone(),
    ));
    controller.start().await;
    Harness {
        controller,
        backend,
        camera,
    }
}

async fn harness() -> Harness {
    harness_with(FakeBackend::default(), Some(Credential::new("token"))).await
}

fn photos(count: usize) -> Vec<MediaItem> {
    (0..count)
        .map(|i| MediaItem::new(format!("scene-{i}.jpg"), "image/jpeg", vec![1u8; 32]))
        .collect()
}

fn contents(controller: &ConversationController) -> Vec<String> {
    controller
        .messages()
        .iter()
        .map(|message| message.content().to_string())
        .collect()
}

fn error_count(controller: &ConversationController) -> usize {
    controller
        .messages()
        .iter()
        .filter(|message| message.is_error())
        .count()
}

async fn reach_media_pending(h: &Harness) {
    let outcome = h
        .controller
        .submit_text("2024-11-15 10:00, Gangnam, car collision")
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn start_shows_greeting() {
    let h = harness().await;

    assert_eq!(contents(&h.controller), script::GREETING.to_vec());
    assert_eq!(h.controller.phase(), ConversationPhase::Intake);
}

#[tokio::test(start_paused = true)]
async fn analysis_emits_four_messages_and_advances() {
    let h = harness().await;

    reach_media_pending(&h).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2 + 1 + 4);
    assert_eq!(messages[2].sender(), MessageSender::User);
    let system: Vec<_> = messages[3..].iter().map(|m| m.content()).collect();
    assert_eq!(
        system,
        script::after_analysis(FOLLOW_UP, h.controller.upload_policy())
    );

    let report = h.controller.report().await.unwrap();
    assert_eq!(report.report_id, "R1");
    assert_eq!(report.owner_id, 7);
    assert!(!report.is_finalized());
}

#[tokio::test(start_paused = true)]
async fn whitespace_description_is_rejected_locally() {
    let h = harness().await;

    let err = h.controller.submit_text("   ").await.unwrap_err();

    assert_eq!(err, AraError::Validation(ValidationError::EmptyInput));
    assert_eq!(h.backend.network_calls(), 0);
    assert_eq!(error_count(&h.controller), 1);
    assert_eq!(h.controller.phase(), ConversationPhase::Intake);
}

#[tokio::test(start_paused = true)]
async fn missing_credential_blocks_analysis() {
    let h = harness_with(FakeBackend::default(), None).await;

    let err = h.controller.submit_text("car collision").await.unwrap_err();

    assert_eq!(err, AraError::Unauthenticated);
    assert_eq!(h.backend.network_calls(), 0);
    assert_eq!(error_count(&h.controller), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_analysis_stays_in_intake() {
    let h = harness().await;
    h.backend.fail_analyze.store(true, Ordering::SeqCst);

    let err = h.controller.submit_text("car collision").await.unwrap_err();

    assert!(matches!(err, AraError::Analysis(ref remote) if remote.status == Some(500)));
    assert_eq!(h.controller.phase(), ConversationPhase::Intake);
    assert_eq!(error_count(&h.controller), 1);
    assert!(h.controller.report().await.is_none());

    h.backend.fail_analyze.store(false, Ordering::SeqCst);
    reach_media_pending(&h).await;
}

#[tokio::test(start_paused = true)]
async fn duplicate_submit_is_ignored_while_pending() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeBackend::gated(gate.clone()), Some(Credential::new("t"))).await;

    let first = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.submit_text("car collision").await })
    };
    while h.backend.analyze_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(h.controller.timeline_view().thinking);

    let second = h.controller.submit_text("car collision").await.unwrap();
    assert_eq!(second, Outcome::ignored(IgnoreReason::CallPending));

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(h.backend.analyze_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.messages().len(), 2 + 1 + 4);
    assert!(!h.controller.timeline_view().thinking);
}

#[tokio::test(start_paused = true)]
async fn text_after_intake_is_ignored() {
    let h = harness().await;
    reach_media_pending(&h).await;
    let before = h.controller.messages().len();

    let outcome = h.controller.submit_text("another accident").await.unwrap();

    assert_eq!(
        outcome,
        Outcome::ignored(IgnoreReason::WrongPhase(ConversationPhase::MediaPending))
    );
    assert_eq!(h.controller.messages().len(), before);
    assert_eq!(h.backend.analyze_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn media_before_analysis_is_ignored() {
    let h = harness().await;

    let outcome = h.controller.upload_batch(photos(5)).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::ignored(IgnoreReason::WrongPhase(ConversationPhase::Intake))
    );
    assert_eq!(h.backend.network_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn photo_count_outside_bounds_never_hits_network() {
    let h = harness().await;
    reach_media_pending(&h).await;
    let calls = h.backend.network_calls();

    for count in [3, 7] {
        let err = h.controller.upload_batch(photos(count)).await.unwrap_err();
        assert!(err.is_validation());
    }

    assert_eq!(h.backend.network_calls(), calls);
    assert_eq!(error_count(&h.controller), 2);
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
}

#[tokio::test(start_paused = true)]
async fn five_photos_complete_the_report() {
    let h = harness().await;
    reach_media_pending(&h).await;

    let outcome = h.controller.upload_batch(photos(5)).await.unwrap();

    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(h.controller.phase(), ConversationPhase::Complete);
    assert_eq!(*h.backend.finalized_kinds.lock().unwrap(), vec![MediaKind::Image]);

    let report = h.controller.view_report().await.unwrap();
    assert_eq!(report.description.as_deref(), Some(DESCRIPTION));
    assert_eq!(report.media_refs.len(), 5);
    assert_eq!(report.media_kind, MediaKind::Image);

    let tail: Vec<_> = contents(&h.controller).into_iter().rev().take(3).rev().collect();
    assert_eq!(tail, script::after_finalize(DESCRIPTION));
    assert_eq!(h.controller.upload_progress(), 0);
}

#[tokio::test(start_paused = true)]
async fn finalize_failure_stays_in_media_pending_and_retry_completes() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.backend.fail_finalize.store(true, Ordering::SeqCst);

    let err = h.controller.upload_batch(photos(4)).await.unwrap_err();

    assert!(matches!(err, AraError::Finalize(ref remote) if remote.status == Some(502)));
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
    assert_eq!(error_count(&h.controller), 1);
    assert!(!h.controller.timeline_view().thinking);
    assert!(h.controller.view_report().await.is_none());

    h.backend.fail_finalize.store(false, Ordering::SeqCst);
    let retry = h.controller.upload_batch(photos(4)).await.unwrap();

    assert_eq!(retry, Outcome::Applied);
    assert_eq!(h.controller.phase(), ConversationPhase::Complete);
    assert_eq!(h.backend.finalize_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.controller.view_report().await.unwrap().media_refs.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn unreadable_attachment_is_reported_in_timeline() {
    let h = harness().await;
    reach_media_pending(&h).await;
    let calls = h.backend.network_calls();

    let err = h
        .controller
        .reject_input(AraError::io("scene-9.jpg: No such file or directory"))
        .await
        .unwrap_err();

    let last = h.controller.messages().last().cloned().unwrap();
    assert!(last.is_error());
    assert_eq!(last.content(), err.user_message());
    assert_eq!(error_count(&h.controller), 1);
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
    assert_eq!(h.backend.network_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn single_video_is_accepted() {
    let h = harness().await;
    reach_media_pending(&h).await;

    let video = MediaItem::new("scene.mp4", "video/mp4", vec![9u8; 64]);
    let outcome = h.controller.upload_batch(vec![video]).await.unwrap();

    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(*h.backend.finalized_kinds.lock().unwrap(), vec![MediaKind::Video]);
}

#[tokio::test(start_paused = true)]
async fn upload_failure_keeps_media_pending() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.backend.fail_upload.store(true, Ordering::SeqCst);

    let err = h.controller.upload_batch(photos(4)).await.unwrap_err();

    assert!(matches!(err, AraError::Upload(ref remote) if remote.is_transport()));
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
    assert_eq!(error_count(&h.controller), 1);
    assert_eq!(h.controller.upload_progress(), 0);
    assert_eq!(h.backend.finalize_calls.load(Ordering::SeqCst), 0);
    assert!(h.controller.report().await.unwrap().media_refs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn recording_round_trip_finalizes_as_video() {
    let h = harness().await;
    reach_media_pending(&h).await;

    assert_eq!(h.controller.start_capture().await.unwrap(), Outcome::Applied);
    assert_eq!(h.controller.capture_state(), RecordingState::Recording);
    assert_eq!(h.camera.live(), 1);

    assert_eq!(h.controller.stop_capture().await.unwrap(), Outcome::Applied);
    assert_eq!(h.controller.capture_state(), RecordingState::Reviewing);
    assert_eq!(h.camera.live(), 0);

    assert_eq!(h.controller.upload_recording().await.unwrap(), Outcome::Applied);
    assert_eq!(h.controller.capture_state(), RecordingState::Idle);
    assert_eq!(h.controller.phase(), ConversationPhase::Complete);
    assert_eq!(*h.backend.finalized_kinds.lock().unwrap(), vec![MediaKind::Video]);
}

#[tokio::test(start_paused = true)]
async fn failed_recording_upload_keeps_clip_and_device_released() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.controller.start_capture().await.unwrap();
    h.controller.stop_capture().await.unwrap();
    h.backend.fail_upload.store(true, Ordering::SeqCst);

    let err = h.controller.upload_recording().await.unwrap_err();

    assert!(matches!(err, AraError::Upload(_)));
    assert_eq!(h.camera.live(), 0);
    assert_eq!(h.controller.capture_state(), RecordingState::Reviewing);
    assert_eq!(h.controller.phase(), ConversationPhase::MediaPending);
    assert_eq!(error_count(&h.controller), 1);

    h.backend.fail_upload.store(false, Ordering::SeqCst);
    assert_eq!(h.controller.upload_recording().await.unwrap(), Outcome::Applied);
}

#[tokio::test(start_paused = true)]
async fn retake_discards_clip_and_reopens_camera() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.controller.start_capture().await.unwrap();
    h.controller.stop_capture().await.unwrap();

    assert_eq!(h.controller.retake().await.unwrap(), Outcome::Applied);

    assert_eq!(h.controller.capture_state(), RecordingState::Streaming);
    assert_eq!(h.camera.live(), 1);
    assert_eq!(h.camera.acquisitions.load(Ordering::SeqCst), 2);

    assert_eq!(h.controller.close_camera().await, Outcome::Applied);
    assert_eq!(h.camera.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_camera_disables_recording_until_restart() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.camera.fail_next(DeviceError::NotFound);

    let err = h.controller.open_camera().await.unwrap_err();
    assert_eq!(err, AraError::Device(DeviceError::NotFound));
    assert!(h.controller.camera_disabled().await);
    assert_eq!(h.controller.capture_state(), RecordingState::Idle);

    let again = h.controller.start_capture().await.unwrap_err();
    assert_eq!(again, AraError::Device(DeviceError::NotFound));
    assert_eq!(h.camera.acquisitions.load(Ordering::SeqCst), 0);

    h.controller.restart().await;
    assert!(!h.controller.camera_disabled().await);
}

#[tokio::test(start_paused = true)]
async fn permission_denied_leaves_camera_idle() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.camera.fail_next(DeviceError::PermissionDenied);

    let err = h.controller.open_camera().await.unwrap_err();

    assert_eq!(err, AraError::Device(DeviceError::PermissionDenied));
    assert!(!h.controller.camera_disabled().await);
    assert_eq!(h.controller.capture_state(), RecordingState::Idle);
    assert_eq!(error_count(&h.controller), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_clears_everything_and_replays_greeting() {
    let h = harness().await;
    let greeting = contents(&h.controller);
    reach_media_pending(&h).await;
    h.controller.start_capture().await.unwrap();

    h.controller.restart().await;

    assert_eq!(h.controller.phase(), ConversationPhase::Intake);
    assert_eq!(contents(&h.controller), greeting);
    assert!(h.controller.report().await.is_none());
    assert_eq!(h.controller.capture_state(), RecordingState::Idle);
    assert_eq!(h.camera.live(), 0);
    assert_eq!(h.controller.upload_progress(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_analysis_after_restart_is_discarded() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(FakeBackend::gated(gate.clone()), Some(Credential::new("t"))).await;

    let pending = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.submit_text("car collision").await })
    };
    while h.backend.analyze_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    h.controller.restart().await;
    gate.notify_one();

    assert_eq!(
        pending.await.unwrap().unwrap(),
        Outcome::ignored(IgnoreReason::Stale)
    );
    assert_eq!(h.controller.phase(), ConversationPhase::Intake);
    assert_eq!(contents(&h.controller), script::GREETING.to_vec());
    assert!(h.controller.report().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn restart_recovers_from_stalled_analysis() {
    let h = harness().await;
    h.backend.stall_next_analyze.store(true, Ordering::SeqCst);

    let stalled = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.submit_text("car collision").await })
    };
    while h.backend.analyze_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(h.controller.timeline_view().thinking);

    h.controller.restart().await;
    assert!(!h.controller.timeline_view().thinking);

    reach_media_pending(&h).await;
    assert_eq!(h.backend.analyze_calls.load(Ordering::SeqCst), 2);
    assert!(!stalled.is_finished());
    stalled.abort();
}

#[tokio::test(start_paused = true)]
async fn restart_recovers_from_stalled_upload() {
    let h = harness().await;
    reach_media_pending(&h).await;
    h.backend.stall_next_upload.store(true, Ordering::SeqCst);

    let stalled = {
        let controller = h.controller.clone();
        tokio::spawn(async move { controller.upload_batch(photos(4)).await })
    };
    while h.backend.upload_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.controller.upload_progress(), 40);

    h.controller.restart().await;
    assert_eq!(h.controller.upload_progress(), 0);

    reach_media_pending(&h).await;
    assert_eq!(h.controller.upload_batch(photos(5)).await.unwrap(), Outcome::Applied);
    assert_eq!(h.controller.phase(), ConversationPhase::Complete);
    assert_eq!(h.controller.view_report().await.unwrap().media_refs.len(), 5);

    stalled.abort();
    assert!(stalled.await.unwrap_err().is_cancelled());
    assert_eq!(h.controller.phase(), ConversationPhase::Complete);
    assert_eq!(h.controller.upload_progress(), 0);
}
