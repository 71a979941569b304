//! Per-session store of captured responses.

use std::collections::HashMap;

use lotcheck_checklist::{CapturedValue, ChecklistItemId, ItemResponse, PhotoBlob};

/// An item id that is not part of the session's checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("item {0} is not part of this checklist")]
pub struct UnknownItem(pub ChecklistItemId);

/// Holds one response per checklist item, created on first visit.
///
/// Owned by a single controller; nothing here is shared across sessions.
#[derive(Debug, Clone)]
pub struct ResponseAccumulator {
  order: Vec<ChecklistItemId>,
  responses: HashMap<ChecklistItemId, ItemResponse>,
}

impl ResponseAccumulator {
  /// Create an accumulator for items in checklist order.
  pub fn new(order: Vec<ChecklistItemId>) -> Self {
    Self {
      order,
      responses: HashMap::new(),
    }
  }

  fn entry(&mut self, item: ChecklistItemId) -> Result<&mut ItemResponse, UnknownItem> {
    if !self.order.contains(&item) {
      return Err(UnknownItem(item));
    }
    Ok(
      self
        .responses
        .entry(item)
        .or_insert_with(|| ItemResponse::empty(item)),
    )
  }

  /// Record a visit, creating the empty response if needed.
  pub fn visit(&mut self, item: ChecklistItemId) -> Result<(), UnknownItem> {
    self.entry(item).map(|_| ())
  }

  pub fn set_value(
    &mut self,
    item: ChecklistItemId,
    value: Option<CapturedValue>,
  ) -> Result<(), UnknownItem> {
    self.entry(item)?.value = value;
    Ok(())
  }

  pub fn set_comment(&mut self, item: ChecklistItemId, text: impl Into<String>) -> Result<(), UnknownItem> {
    self.entry(item)?.comment = text.into();
    Ok(())
  }

  pub fn append_photo(&mut self, item: ChecklistItemId, photo: PhotoBlob) -> Result<(), UnknownItem> {
    self.entry(item)?.photos.push(photo);
    Ok(())
  }

  pub fn get(&self, item: ChecklistItemId) -> Option<&ItemResponse> {
    self.responses.get(&item)
  }

  /// Responses of visited items, in checklist order.
  pub fn get_all(&self) -> Vec<&ItemResponse> {
    self
      .order
      .iter()
      .filter_map(|id| self.responses.get(id))
      .collect()
  }

  /// One response per checklist item, unvisited ones left empty.
  pub fn snapshot(&self) -> Vec<ItemResponse> {
    self
      .order
      .iter()
      .map(|id| {
        self
          .responses
          .get(id)
          .cloned()
          .unwrap_or_else(|| ItemResponse::empty(*id))
      })
      .collect()
  }

  pub fn item_count(&self) -> usize {
    self.order.len()
  }
}
