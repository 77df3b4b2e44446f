//! Camera device adapters.
//!
//! - [`FileCameraDevice`]: replays a video file as if it were being recorded
//! - [`UnavailableCamera`]: a machine without a camera

use ara_core::capture::{CameraDevice, DeviceStream, MediaRecorder};
use ara_core::error::DeviceError;
use ara_core::report::MediaKind;
use ara_core::upload::MediaItem;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bytes emitted per time slice while replaying.
const REPLAY_CHUNK_BYTES: usize = 64 * 1024;

/// A camera that "records" an existing video file.
///
/// Each time slice emits the next piece of the file; stopping the recorder
/// flushes whatever is left, so a stopped recording always yields the whole
/// file. Background replay is cancelled when the recorder stops or the
/// stream's tracks are stopped.
pub struct FileCameraDevice {
    path: PathBuf,
    chunk_bytes: usize,
}

impl FileCameraDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_bytes: REPLAY_CHUNK_BYTES,
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }
}

#[async_trait]
impl CameraDevice for FileCameraDevice {
    async fn acquire(&self) -> Result<Box<dyn DeviceStream>, DeviceError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => DeviceError::NotFound,
                ErrorKind::PermissionDenied => DeviceError::PermissionDenied,
                _ => DeviceError::Other(format!("{}: {}", self.path.display(), err)),
            })?;

        let mime_type = mime_guess::from_path(&self.path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let probe = MediaItem::new("", mime_type.clone(), Bytes::new());
        if probe.media_kind() != MediaKind::Video {
            return Err(DeviceError::Other(format!(
                "{} is not a video file ({})",
                self.path.display(),
                mime_type
            )));
        }

        tracing::info!(
            "[FileCameraDevice] Opened {} ({}, {} bytes)",
            self.path.display(),
            mime_type,
            data.len()
        );
        Ok(Box::new(FileStream {
            data: Bytes::from(data),
            mime_type,
            chunk_bytes: self.chunk_bytes,
            tracks: CancellationToken::new(),
        }))
    }
}

struct FileStream {
    data: Bytes,
    mime_type: String,
    chunk_bytes: usize,
    tracks: CancellationToken,
}

impl DeviceStream for FileStream {
    fn start_recorder(
        &mut self,
        slice: Duration,
        sink: mpsc::UnboundedSender<Bytes>,
    ) -> Result<Box<dyn MediaRecorder>, DeviceError> {
        if !self.is_live() {
            return Err(DeviceError::Other("the camera stream has ended".to_string()));
        }

        let stop = self.tracks.child_token();
        tokio::spawn(replay(
            self.data.clone(),
            slice,
            self.chunk_bytes,
            sink,
            stop.clone(),
            self.tracks.clone(),
        ));
        Ok(Box::new(FileRecorder {
            mime_type: self.mime_type.clone(),
            stop,
        }))
    }

    fn stop_tracks(&mut self) {
        if !self.tracks.is_cancelled() {
            tracing::debug!("[FileCameraDevice] Stopping tracks");
            self.tracks.cancel();
        }
    }

    fn is_live(&self) -> bool {
        !self.tracks.is_cancelled()
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

struct FileRecorder {
    mime_type: String,
    stop: CancellationToken,
}

impl MediaRecorder for FileRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn stop(&mut self) {
        self.stop.cancel();
    }
}

/// Emits one chunk per slice until stopped, then flushes the remainder
/// unless the tracks themselves were stopped. The sink drops on return.
async fn replay(
    data: Bytes,
    slice: Duration,
    chunk_bytes: usize,
    sink: mpsc::UnboundedSender<Bytes>,
    stop: CancellationToken,
    tracks: CancellationToken,
) {
    let mut offset = 0;
    let mut ticker = tokio::time::interval(slice);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if offset < data.len() {
                    let end = (offset + chunk_bytes).min(data.len());
                    if sink.send(data.slice(offset..end)).is_err() {
                        return;
                    }
                    offset = end;
                }
            }
        }
    }

    if !tracks.is_cancelled() && offset < data.len() {
        sink.send(data.slice(offset..)).ok();
    }
}

/// A camera that is never there. Every acquisition fails with `NotFound`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCamera;

#[async_trait]
impl CameraDevice for UnavailableCamera {
    async fn acquire(&self) -> Result<Box<dyn DeviceStream>, DeviceError> {
        Err(DeviceError::NotFound)
    }
}
