//! Application layer for ARA.
//!
//! This crate provides the conversation controller that coordinates the
//! domain state machines in `ara-core` with a report backend and a camera.
//!
//! # Module Structure
//!
//! - `conversation_controller`: The phase controller and every user intent
//! - `outcome`: What an intent did (`Outcome`, `IgnoreReason`)
//! - `busy`: Non-blocking single-occupancy flags

mod busy;
pub mod conversation_controller;
pub mod outcome;

pub use conversation_controller::ConversationController;
pub use outcome::{IgnoreReason, Outcome};
