pub mod backend;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod credential;
pub mod error;
pub mod report;
pub mod upload;

// Re-export common error type
pub use error::{AraError, Result};
