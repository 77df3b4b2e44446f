//! Camera capture domain module.
//!
//! - `device`: Camera contracts implemented by platform adapters
//! - `machine`: The recording state machine (`CaptureMachine`)

mod device;
mod machine;

pub use device::{CameraDevice, DeviceStream, MediaRecorder};
pub use machine::{CaptureMachine, RecordingState};
