//! Camera device contracts.
//!
//! A [`CameraDevice`] hands out exclusive [`DeviceStream`]s; a stream can
//! start a [`MediaRecorder`] that pushes time-sliced fragments into a channel.

use crate::error::DeviceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// A source of camera streams.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Acquires exclusive access to the camera.
    ///
    /// # Errors
    ///
    /// - `DeviceError::PermissionDenied` when the user refused access
    /// - `DeviceError::NotFound` when no camera exists
    async fn acquire(&self) -> Result<Box<dyn DeviceStream>, DeviceError>;
}

/// A live camera stream.
pub trait DeviceStream: Send + Sync {
    /// Starts recording. Fragments are sent to `sink` every `slice`.
    ///
    /// The recorder must drop `sink` once it has flushed its final fragment
    /// after [`MediaRecorder::stop`], so the receiver observes the end.
    fn start_recorder(
        &mut self,
        slice: Duration,
        sink: mpsc::UnboundedSender<Bytes>,
    ) -> Result<Box<dyn MediaRecorder>, DeviceError>;

    /// Stops every track of the stream, turning the camera off. Idempotent.
    fn stop_tracks(&mut self);

    /// Returns true while at least one track is still running.
    fn is_live(&self) -> bool;
}

/// An active recorder bound to a stream.
pub trait MediaRecorder: Send + Sync {
    /// MIME type of the produced fragments.
    fn mime_type(&self) -> &str;

    /// Requests the recorder to flush and finish.
    fn stop(&mut self);
}
