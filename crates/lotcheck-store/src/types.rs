use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotcheck_checklist::{
  ChecklistId, ChecklistItemId, ChecklistItemRef, ExecutionStatus, ItemResultId, ItemStatus,
  ProcessId, SessionId, Verdict,
};

/// A process sheet: the lot being inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
  pub id: ProcessId,
  pub name: String,
  #[serde(default)]
  pub lot_number: String,
  #[serde(default)]
  pub assignee: String,
  #[serde(default)]
  pub checklist_id: Option<ChecklistId>,
}

/// A checklist and its items in checklist order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistRecord {
  pub id: ChecklistId,
  pub name: String,
  pub items: Vec<ChecklistItemRef>,
}

/// Request to create a session.
///
/// Sessions are always created `running` with no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
  pub process_id: ProcessId,
  pub checklist_id: ChecklistId,
  pub started_at: DateTime<Utc>,
}

/// An execution session as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
  pub id: SessionId,
  pub process_id: Option<ProcessId>,
  pub checklist_id: ChecklistId,
  pub status: ExecutionStatus,
  /// `None` until the session is confirmed.
  pub result: Option<Verdict>,
  pub executor: Option<String>,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
  pub created_at: Option<DateTime<Utc>>,
}

/// One item in a bulk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemWrite {
  pub checklist_item_id: ChecklistItemId,
  pub value: String,
  pub note: String,
  pub status: ItemStatus,
}

/// Bulk write of every item result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResultsWrite {
  pub status: ExecutionStatus,
  pub finished_at: DateTime<Utc>,
  pub items: Vec<ItemWrite>,
}

/// A persisted item result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResultRecord {
  pub id: ItemResultId,
  pub checklist_item_id: ChecklistItemId,
  pub status: ItemStatus,
  pub value: String,
  pub note: String,
  /// Title of the checklist item, when the store can resolve it.
  pub title: Option<String>,
}

/// One photo to attach to an item result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoUpload<'a> {
  pub item_result_id: ItemResultId,
  pub image: &'a [u8],
  pub mime_type: &'a str,
  pub annotation: &'a str,
}

/// Title shown for an item whose master record carries no name.
pub fn fallback_item_title(id: ChecklistItemId) -> String {
  format!("Item {}", id)
}

/// Treat empty strings as absent.
pub(crate) fn non_empty(value: &str) -> Option<String> {
  if value.is_empty() {
    None
  } else {
    Some(value.to_string())
  }
}
