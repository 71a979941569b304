use serde::{Deserialize, Serialize};

use crate::ids::ChecklistItemId;
use crate::status::{ItemStatus, infer_status};
use crate::value::CapturedValue;

/// A captured photo awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoBlob {
  pub bytes: Vec<u8>,
  pub mime_type: String,
  #[serde(default)]
  pub annotation: String,
}

impl PhotoBlob {
  /// Create a photo with no annotation.
  pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
    Self {
      bytes,
      mime_type: mime_type.into(),
      annotation: String::new(),
    }
  }

  /// Attach an annotation to the photo.
  pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
    self.annotation = annotation.into();
    self
  }
}

/// Everything captured locally for one checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResponse {
  pub checklist_item_id: ChecklistItemId,
  pub value: Option<CapturedValue>,
  pub comment: String,
  pub photos: Vec<PhotoBlob>,
}

impl ItemResponse {
  /// An unanswered response.
  pub fn empty(checklist_item_id: ChecklistItemId) -> Self {
    Self {
      checklist_item_id,
      value: None,
      comment: String::new(),
      photos: Vec::new(),
    }
  }

  /// The status inferred from the captured value.
  pub fn status(&self) -> ItemStatus {
    infer_status(self.value.as_ref())
  }

  /// The value as written to the record store; empty when unanswered.
  pub fn value_text(&self) -> String {
    self
      .value
      .as_ref()
      .map(ToString::to_string)
      .unwrap_or_default()
  }
}
