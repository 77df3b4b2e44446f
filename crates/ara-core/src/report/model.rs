//! Report aggregate model.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

pub type OwnerId = i64;

/// Which kind of evidence is attached to a report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    None,
}

/// Server-assigned identifiers of a report, returned by the analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHandle {
    pub report_id: String,
    pub owner_id: OwnerId,
}

/// The evolving, server-confirmed report held client-side.
///
/// Only the conversation controller mutates it, and only after a backend
/// call has settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAggregate {
    pub report_id: String,
    pub owner_id: OwnerId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub media_refs: Vec<String>,
    #[serde(default)]
    pub media_kind: MediaKind,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ReportAggregate {
    /// Creates the aggregate from a freshly analyzed report.
    pub fn from_handle(handle: ReportHandle) -> Self {
        Self {
            report_id: handle.report_id,
            owner_id: handle.owner_id,
            description: None,
            media_refs: Vec::new(),
            media_kind: MediaKind::None,
        }
    }

    pub fn handle(&self) -> ReportHandle {
        ReportHandle {
            report_id: self.report_id.clone(),
            owner_id: self.owner_id,
        }
    }

    /// Records the references returned by a completed upload.
    pub fn attach_media(&mut self, media_refs: Vec<String>, kind: MediaKind) {
        self.media_refs = media_refs;
        self.media_kind = kind;
    }

    /// Merges the result of a completed finalize call.
    ///
    /// The description always comes from the finalize response. The server's
    /// copy of the report wins for media fields it actually carries; a copy
    /// with a different report id is ignored.
    pub fn merge_finalized(&mut self, description: String, confirmed: &ReportAggregate) {
        if confirmed.report_id == self.report_id {
            if !confirmed.media_refs.is_empty() {
                self.media_refs = confirmed.media_refs.clone();
            }
            if confirmed.media_kind != MediaKind::None {
                self.media_kind = confirmed.media_kind;
            }
        } else {
            tracing::warn!(
                "[ReportAggregate] Finalize returned report '{}' for '{}', keeping local media fields",
                confirmed.report_id,
                self.report_id
            );
        }
        self.description = Some(description);
    }

    pub fn is_finalized(&self) -> bool {
        self.description.is_some()
    }
}
