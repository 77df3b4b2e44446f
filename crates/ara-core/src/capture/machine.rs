//! Camera recording state machine.

use super::device::{CameraDevice, DeviceStream, MediaRecorder};
use crate::error::{AraError, Result};
use crate::upload::RecordedClip;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::{mpsc, watch};

/// Upper bound on waiting for a stopped recorder to flush its last fragment.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Observable recording state, without the resources each state owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordingState {
    Idle,
    Initializing,
    Streaming,
    Recording,
    Reviewing,
    Uploading,
}

/// A device stream owned by the machine. Dropping it stops every track.
struct LiveStream {
    inner: Box<dyn DeviceStream>,
}

impl LiveStream {
    fn new(inner: Box<dyn DeviceStream>) -> Self {
        Self { inner }
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.inner.stop_tracks();
        tracing::debug!("[CaptureMachine] Device stream released");
    }
}

enum CaptureState {
    Idle,
    Initializing,
    Streaming {
        stream: LiveStream,
    },
    Recording {
        // Field order matters: the recorder drops before its stream.
        recorder: Box<dyn MediaRecorder>,
        stream: LiveStream,
        chunks: mpsc::UnboundedReceiver<Bytes>,
        buffered: Vec<Bytes>,
    },
    Reviewing {
        clip: RecordedClip,
    },
    Uploading {
        clip: RecordedClip,
    },
}

impl CaptureState {
    fn kind(&self) -> RecordingState {
        match self {
            Self::Idle => RecordingState::Idle,
            Self::Initializing => RecordingState::Initializing,
            Self::Streaming { .. } => RecordingState::Streaming,
            Self::Recording { .. } => RecordingState::Recording,
            Self::Reviewing { .. } => RecordingState::Reviewing,
            Self::Uploading { .. } => RecordingState::Uploading,
        }
    }
}

/// Owns the camera for one conversation.
///
/// Transitions happen only through the named events below. Whenever a
/// transition leaves a stream-holding state, the previous state is dropped
/// and its [`LiveStream`] stops the device, so no exit path can leak the camera.
///
/// ```text
/// Idle → Initializing → Streaming → Recording → Reviewing → Uploading → Idle
///             ↓                                    ↓  ↑          ↓
///           Idle                          (retake) Streaming   Reviewing
/// ```
pub struct CaptureMachine {
    device: Arc<dyn CameraDevice>,
    slice_interval: Duration,
    state: CaptureState,
    status: watch::Sender<RecordingState>,
}

impl CaptureMachine {
    pub fn new(device: Arc<dyn CameraDevice>, slice_interval: Duration) -> Self {
        let (status, _) = watch::channel(RecordingState::Idle);
        Self {
            device,
            slice_interval,
            state: CaptureState::Idle,
            status,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state.kind()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordingState> {
        self.status.subscribe()
    }

    /// Camera activation: `* → Initializing → Streaming`.
    ///
    /// Any previous stream or clip is torn down first. On failure the
    /// machine is back in `Idle` with nothing retained.
    pub async fn activate(&mut self) -> Result<()> {
        if matches!(self.state, CaptureState::Uploading { .. }) {
            return Err(self.rejected("open the camera"));
        }
        self.teardown();
        self.acquire_stream().await
    }

    /// `Streaming → Recording`.
    pub fn start_recording(&mut self) -> Result<()> {
        match self.take_state() {
            CaptureState::Streaming { mut stream } => {
                let (sink, chunks) = mpsc::unbounded_channel();
                match stream.inner.start_recorder(self.slice_interval, sink) {
                    Ok(recorder) => {
                        tracing::info!(
                            "[CaptureMachine] Recording started ({} slices of {:?})",
                            recorder.mime_type(),
                            self.slice_interval
                        );
                        self.set_state(CaptureState::Recording {
                            recorder,
                            stream,
                            chunks,
                            buffered: Vec::new(),
                        });
                        Ok(())
                    }
                    Err(err) => {
                        self.set_state(CaptureState::Streaming { stream });
                        Err(err.into())
                    }
                }
            }
            other => self.restore(other, "start recording"),
        }
    }

    /// `Recording → Reviewing`.
    ///
    /// Flushes the recorder, concatenates every fragment into one clip and
    /// releases the device stream so the camera is off during review.
    pub async fn stop_recording(&mut self) -> Result<()> {
        match self.take_state() {
            CaptureState::Recording {
                mut recorder,
                stream,
                mut chunks,
                mut buffered,
            } => {
                recorder.stop();
                let mime_type = recorder.mime_type().to_string();

                let flushed = tokio::time::timeout(FLUSH_TIMEOUT, async {
                    while let Some(chunk) = chunks.recv().await {
                        buffered.push(chunk);
                    }
                })
                .await;
                if flushed.is_err() {
                    tracing::warn!(
                        "[CaptureMachine] Recorder did not finish flushing, keeping {} fragment(s)",
                        buffered.len()
                    );
                }

                drop(recorder);
                drop(stream);

                let clip = RecordedClip::from_chunks(mime_type, &buffered);
                tracing::info!(
                    "[CaptureMachine] Recording stopped: {} fragment(s), {} bytes",
                    buffered.len(),
                    clip.size()
                );
                self.set_state(CaptureState::Reviewing { clip });
                Ok(())
            }
            other => self.restore(other, "stop recording"),
        }
    }

    /// Retake: `Reviewing → Initializing → Streaming`, discarding the clip.
    pub async fn retake(&mut self) -> Result<()> {
        match self.take_state() {
            CaptureState::Reviewing { .. } => self.acquire_stream().await,
            other => self.restore(other, "retake"),
        }
    }

    /// `Reviewing → Uploading`, handing out a copy of the clip.
    pub fn begin_upload(&mut self) -> Result<RecordedClip> {
        match self.take_state() {
            CaptureState::Reviewing { clip } => {
                self.set_state(CaptureState::Uploading { clip: clip.clone() });
                Ok(clip)
            }
            other => {
                let current = other.kind();
                self.state = other;
                Err(AraError::invalid_state(format!(
                    "cannot upload a recording while {current}"
                )))
            }
        }
    }

    /// `Uploading → Idle` on success, `Uploading → Reviewing` on failure so
    /// the clip is kept for another attempt.
    pub fn finish_upload(&mut self, succeeded: bool) {
        match self.take_state() {
            CaptureState::Uploading { clip } => {
                if succeeded {
                    self.set_state(CaptureState::Idle);
                } else {
                    self.set_state(CaptureState::Reviewing { clip });
                }
            }
            other => {
                tracing::debug!(
                    "[CaptureMachine] Upload settled after leaving the uploading state ({})",
                    other.kind()
                );
                self.state = other;
            }
        }
    }

    /// Returns to `Idle` from any state, releasing the device and dropping
    /// any buffered fragments or clip.
    pub fn teardown(&mut self) {
        if !matches!(self.state, CaptureState::Idle) {
            tracing::info!("[CaptureMachine] Tearing down from {}", self.state());
            self.set_state(CaptureState::Idle);
        }
    }

    async fn acquire_stream(&mut self) -> Result<()> {
        self.set_state(CaptureState::Initializing);
        match self.device.acquire().await {
            Ok(stream) => {
                self.set_state(CaptureState::Streaming {
                    stream: LiveStream::new(stream),
                });
                Ok(())
            }
            Err(err) => {
                tracing::warn!("[CaptureMachine] Camera acquisition failed: {}", err);
                self.set_state(CaptureState::Idle);
                Err(err.into())
            }
        }
    }

    fn take_state(&mut self) -> CaptureState {
        std::mem::replace(&mut self.state, CaptureState::Idle)
    }

    fn restore(&mut self, previous: CaptureState, event: &str) -> Result<()> {
        self.state = previous;
        Err(self.rejected(event))
    }

    fn rejected(&self, event: &str) -> AraError {
        AraError::invalid_state(format!("cannot {event} while {}", self.state()))
    }

    fn set_state(&mut self, next: CaptureState) {
        let kind = next.kind();
        // The old state drops here, releasing whatever it owned.
        self.state = next;
        self.status.send_if_modified(|current| {
            if *current == kind {
                false
            } else {
                *current = kind;
                true
            }
        });
    }
}
