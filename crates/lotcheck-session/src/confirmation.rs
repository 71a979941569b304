//! Read-back of a finished session for review and confirmation.
//!
//! Everything here is computed from what the store persisted, never from
//! the wizard's local responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use std::sync::Arc;

use lotcheck_checklist::{
  ChecklistItemId, ChecklistItemRef, ExecutionStatus, ItemResultId, ItemStatus, SessionId,
  StatusTally, Verdict,
};
use lotcheck_store::{
  ItemResultRecord, RecordStore, SessionRecord, StoreError, fallback_item_title,
};
use lotcheck_sync::SyncClient;

use crate::error::SessionError;

/// One persisted item result as shown for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRow {
  /// Wizard index of the item this row belongs to.
  pub index: usize,
  pub item_result_id: ItemResultId,
  pub checklist_item_id: ChecklistItemId,
  pub title: String,
  pub value: String,
  pub comment: String,
  pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationView {
  pub session: SessionRecord,
  pub rows: Vec<ConfirmationRow>,
  pub tally: StatusTally,
}

impl ConfirmationView {
  /// Read a session and its results, resolving titles from `items`.
  pub async fn load(
    store: &dyn RecordStore,
    session_id: SessionId,
    items: &[ChecklistItemRef],
  ) -> Result<Self, StoreError> {
    let session = store.get_session(session_id).await?;
    let results = store.list_item_results(session_id).await?;
    debug!(session_id = %session_id, results = results.len(), "confirmation_loaded");
    Ok(Self::from_parts(session, results, items))
  }

  /// Read a session, its checklist and its results.
  pub async fn fetch(store: &dyn RecordStore, session_id: SessionId) -> Result<Self, StoreError> {
    Ok(Self::fetch_with_item_count(store, session_id).await?.0)
  }

  async fn fetch_with_item_count(
    store: &dyn RecordStore,
    session_id: SessionId,
  ) -> Result<(Self, usize), StoreError> {
    let session = store.get_session(session_id).await?;
    let checklist = store.get_checklist(session.checklist_id).await?;
    let results = store.list_item_results(session_id).await?;
    let view = Self::from_parts(session, results, &checklist.items);
    Ok((view, checklist.items.len()))
  }

  /// Write the verdict of a stored session without a running wizard.
  ///
  /// The session must be completed and hold a result for each of its
  /// checklist's items.
  pub async fn confirm_stored(
    store: Arc<dyn RecordStore>,
    session_id: SessionId,
  ) -> Result<Self, SessionError> {
    let (mut view, item_count) = Self::fetch_with_item_count(store.as_ref(), session_id)
      .await
      .map_err(SessionError::Confirmation)?;
    view.ensure_complete(item_count)?;

    let verdict = view.verdict();
    SyncClient::new(store)
      .finalize(session_id, verdict)
      .await
      .map_err(SessionError::Finalize)?;
    view.session.result = Some(verdict);

    info!(session_id = %session_id, verdict = %verdict, "session_confirmed");
    Ok(view)
  }

  /// Check that the session finished its bulk write for `item_count` items.
  pub fn ensure_complete(&self, item_count: usize) -> Result<(), SessionError> {
    if self.session.status != ExecutionStatus::Completed {
      return Err(SessionError::NotCompleted {
        session_id: self.session.id,
        status: self.session.status,
      });
    }
    if self.rows.len() != item_count {
      return Err(SessionError::MissingResults {
        session_id: self.session.id,
        expected: item_count,
        actual: self.rows.len(),
      });
    }
    Ok(())
  }

  pub fn from_parts(
    session: SessionRecord,
    results: Vec<ItemResultRecord>,
    items: &[ChecklistItemRef],
  ) -> Self {
    let tally = StatusTally::from_statuses(results.iter().map(|r| r.status));
    let rows = results
      .into_iter()
      .enumerate()
      .map(|(position, result)| {
        let item = items
          .iter()
          .position(|i| i.id == result.checklist_item_id);
        let title = result
          .title
          .or_else(|| item.map(|i| items[i].title.clone()))
          .unwrap_or_else(|| fallback_item_title(result.checklist_item_id));
        ConfirmationRow {
          index: item.unwrap_or(position),
          item_result_id: result.id,
          checklist_item_id: result.checklist_item_id,
          title,
          value: result.value,
          comment: result.note,
          status: result.status,
        }
      })
      .collect();

    Self {
      session,
      rows,
      tally,
    }
  }

  /// The verdict computed from the persisted statuses.
  pub fn verdict(&self) -> Verdict {
    self.tally.verdict()
  }

  /// The verdict shown on the summary: the stored result once confirmed,
  /// otherwise `fail` if anything is NG and `pass` if not.
  pub fn display_label(&self) -> Verdict {
    self.session.result.unwrap_or(if self.tally.ng > 0 {
      Verdict::Fail
    } else {
      Verdict::Pass
    })
  }

  pub fn started_at(&self) -> Option<DateTime<Utc>> {
    self.session.started_at.or(self.session.created_at)
  }

  pub fn finished_at(&self) -> Option<DateTime<Utc>> {
    self.session.finished_at
  }

  /// Session duration in whole minutes, rounded.
  pub fn duration_minutes(&self) -> Option<i64> {
    let start = self.started_at()?;
    let end = self.finished_at()?;
    if end <= start {
      return None;
    }
    let seconds = (end - start).num_seconds();
    Some((seconds as f64 / 60.0).round() as i64)
  }

  /// The wizard index to re-enter for a row.
  pub fn index_of_row(&self, row: usize) -> Option<usize> {
    self.rows.get(row).map(|r| r.index)
  }
}
