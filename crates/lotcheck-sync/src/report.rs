use lotcheck_checklist::ChecklistItemId;

/// One photo that could not be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFailure {
  pub checklist_item_id: ChecklistItemId,
  /// Position of the photo within the item's photo list.
  pub photo_index: usize,
  pub message: String,
}

/// Outcome of the photo-upload phase.
///
/// Upload failures do not abort the phase; they are collected here in
/// checklist order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
  pub uploaded: usize,
  pub failures: Vec<PhotoFailure>,
  /// Items with photos but no persisted result id.
  pub skipped_items: Vec<ChecklistItemId>,
}

impl UploadReport {
  pub fn attempted(&self) -> usize {
    self.uploaded + self.failures.len()
  }

  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }

  /// A user-facing warning when some photos were not stored.
  pub fn warning(&self) -> Option<String> {
    if self.is_complete() {
      return None;
    }
    Some(format!(
      "{} of {} photos failed to upload and are not attached to the results",
      self.failures.len(),
      self.attempted()
    ))
  }
}
