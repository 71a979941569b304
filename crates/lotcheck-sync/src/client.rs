//! The synchronization client.

use std::sync::Arc;

use chrono::Utc;
use lotcheck_checklist::{ChecklistId, ExecutionStatus, ItemResponse, ProcessId, SessionId, Verdict};
use lotcheck_store::{
  ChecklistRecord, ItemResultsWrite, ItemWrite, NewSession, PhotoUpload, ProcessRecord,
  RecordStore, SessionRecord,
};
use tracing::{info, instrument, warn};

use crate::error::{SyncError, SyncPhase};
use crate::index::ResultIndex;
use crate::report::{PhotoFailure, UploadReport};

/// A process sheet together with its bound checklist.
#[derive(Debug, Clone)]
pub struct ResolvedChecklist {
  pub process: ProcessRecord,
  pub checklist: ChecklistRecord,
}

/// Runs the synchronization phases against a record store.
#[derive(Clone)]
pub struct SyncClient {
  store: Arc<dyn RecordStore>,
}

impl SyncClient {
  pub fn new(store: Arc<dyn RecordStore>) -> Self {
    Self { store }
  }

  /// The underlying record store.
  pub fn store(&self) -> &dyn RecordStore {
    self.store.as_ref()
  }

  /// Resolve the checklist bound to a process sheet.
  #[instrument(name = "load_checklist", skip(self), fields(process_id = %process_id))]
  pub async fn load_checklist(&self, process_id: ProcessId) -> Result<ResolvedChecklist, SyncError> {
    let process = self
      .store
      .get_process(process_id)
      .await
      .map_err(SyncError::store(SyncPhase::LoadChecklist))?;

    let checklist_id = process
      .checklist_id
      .ok_or(SyncError::MissingChecklist { process_id })?;

    let checklist = self
      .store
      .get_checklist(checklist_id)
      .await
      .map_err(SyncError::store(SyncPhase::LoadChecklist))?;

    info!(
      checklist_id = %checklist.id,
      items = checklist.items.len(),
      "checklist_loaded"
    );
    Ok(ResolvedChecklist { process, checklist })
  }

  /// Phase 1: create the running session.
  #[instrument(name = "create_session", skip(self), fields(process_id = %process_id))]
  pub async fn create_session(
    &self,
    process_id: ProcessId,
    checklist_id: ChecklistId,
  ) -> Result<SessionRecord, SyncError> {
    let request = NewSession {
      process_id,
      checklist_id,
      started_at: Utc::now(),
    };
    let session = self
      .store
      .create_session(&request)
      .await
      .map_err(SyncError::store(SyncPhase::CreateSession))?;

    info!(session_id = %session.id, "session_created");
    Ok(session)
  }

  /// Phase 2: write one result per response and index the returned ids.
  ///
  /// `responses` must cover every checklist item, unanswered ones included.
  #[instrument(
    name = "write_results",
    skip(self, responses),
    fields(session_id = %session_id, items = responses.len())
  )]
  pub async fn write_results(
    &self,
    session_id: SessionId,
    responses: &[ItemResponse],
  ) -> Result<ResultIndex, SyncError> {
    let write = ItemResultsWrite {
      status: ExecutionStatus::Completed,
      finished_at: Utc::now(),
      items: responses
        .iter()
        .map(|r| ItemWrite {
          checklist_item_id: r.checklist_item_id,
          value: r.value_text(),
          note: r.comment.clone(),
          status: r.status(),
        })
        .collect(),
    };

    let results = self
      .store
      .write_item_results(session_id, &write)
      .await
      .map_err(SyncError::store(SyncPhase::WriteResults))?;

    let index = ResultIndex::from_results(session_id, &results);
    for response in responses {
      if index.get(response.checklist_item_id).is_none() {
        warn!(
          session_id = %session_id,
          checklist_item_id = %response.checklist_item_id,
          "result_id_missing"
        );
      }
    }

    info!(session_id = %session_id, written = results.len(), "results_written");
    Ok(index)
  }

  /// Phase 3: upload every captured photo, one at a time in checklist order.
  ///
  /// Failed uploads are reported, not returned as errors.
  #[instrument(name = "upload_photos", skip(self, index, responses), fields(session_id = %index.session_id()))]
  pub async fn upload_photos(&self, index: &ResultIndex, responses: &[ItemResponse]) -> UploadReport {
    let mut report = UploadReport::default();

    for response in responses.iter().filter(|r| !r.photos.is_empty()) {
      let Some(item_result_id) = index.get(response.checklist_item_id) else {
        report.skipped_items.push(response.checklist_item_id);
        continue;
      };

      for (photo_index, photo) in response.photos.iter().enumerate() {
        let upload = PhotoUpload {
          item_result_id,
          image: &photo.bytes,
          mime_type: &photo.mime_type,
          annotation: &photo.annotation,
        };
        match self.store.upload_photo(&upload).await {
          Ok(()) => report.uploaded += 1,
          Err(e) => {
            warn!(
              checklist_item_id = %response.checklist_item_id,
              item_result_id = %item_result_id,
              photo_index,
              error = %e,
              "photo_upload_failed"
            );
            report.failures.push(PhotoFailure {
              checklist_item_id: response.checklist_item_id,
              photo_index,
              message: e.to_string(),
            });
          }
        }
      }
    }

    info!(
      uploaded = report.uploaded,
      failed = report.failures.len(),
      skipped_items = report.skipped_items.len(),
      "photos_uploaded"
    );
    report
  }

  /// Phase 4: write the final verdict. Safe to retry.
  #[instrument(name = "finalize", skip(self), fields(session_id = %session_id, verdict = %verdict))]
  pub async fn finalize(&self, session_id: SessionId, verdict: Verdict) -> Result<(), SyncError> {
    self
      .store
      .finalize_session(session_id, verdict)
      .await
      .map_err(SyncError::store(SyncPhase::Finalize))?;

    info!(session_id = %session_id, verdict = %verdict, "session_finalized");
    Ok(())
  }
}
