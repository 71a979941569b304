use std::collections::HashMap;

use lotcheck_checklist::{ChecklistItemId, ItemResultId, SessionId};
use lotcheck_store::ItemResultRecord;

/// Server-assigned result ids keyed by checklist item.
///
/// Produced by a successful bulk write and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultIndex {
  session_id: SessionId,
  by_item: HashMap<ChecklistItemId, ItemResultId>,
}

impl ResultIndex {
  pub(crate) fn from_results(session_id: SessionId, results: &[ItemResultRecord]) -> Self {
    let by_item = results
      .iter()
      .map(|r| (r.checklist_item_id, r.id))
      .collect();
    Self {
      session_id,
      by_item,
    }
  }

  pub fn session_id(&self) -> SessionId {
    self.session_id
  }

  /// The persisted result id for a checklist item.
  pub fn get(&self, item: ChecklistItemId) -> Option<ItemResultId> {
    self.by_item.get(&item).copied()
  }

  pub fn len(&self) -> usize {
    self.by_item.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_item.is_empty()
  }
}

/// Whether the local responses have been written to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState {
  #[default]
  NotSynced,
  Synced(ResultIndex),
}

impl SyncState {
  pub fn is_synced(&self) -> bool {
    matches!(self, SyncState::Synced(_))
  }

  pub fn result_index(&self) -> Option<&ResultIndex> {
    match self {
      SyncState::NotSynced => None,
      SyncState::Synced(index) => Some(index),
    }
  }
}
