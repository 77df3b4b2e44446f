//! Report domain module.
//!
//! - `model`: The client-held report record (`ReportAggregate`) and its identifiers

mod model;

pub use model::{MediaKind, OwnerId, ReportAggregate, ReportHandle};
