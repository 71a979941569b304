use serde::{Deserialize, Serialize};

use crate::ids::ChecklistItemId;

/// The kind of value an inspection item expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  Numeric,
  FreeText,
  Enumerated,
}

impl ItemKind {
  /// Map a master-data item type to the kind captured during execution.
  ///
  /// Only `number` and `select` have dedicated capture modes; every other
  /// type (including unknown ones) is captured as free text.
  pub fn from_master_type(kind: &str) -> Self {
    match kind {
      "number" => ItemKind::Numeric,
      "select" => ItemKind::Enumerated,
      _ => ItemKind::FreeText,
    }
  }

  /// The name of this kind as shown to users.
  pub fn label(self) -> &'static str {
    match self {
      ItemKind::Numeric => "numeric",
      ItemKind::FreeText => "free-text",
      ItemKind::Enumerated => "enumerated",
    }
  }

  /// The master-data type name for this kind.
  pub fn master_type(self) -> &'static str {
    match self {
      ItemKind::Numeric => "number",
      ItemKind::FreeText => "text",
      ItemKind::Enumerated => "select",
    }
  }
}

/// One inspection item as defined by the checklist.
///
/// Read-only to the execution core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItemRef {
  pub id: ChecklistItemId,
  pub title: String,
  pub instruction: String,
  pub kind: ItemKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unit: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference_image: Option<String>,
}
