use std::fmt;

use lotcheck_checklist::ProcessId;
use lotcheck_store::StoreError;

/// The protocol step a synchronization error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
  LoadChecklist,
  CreateSession,
  WriteResults,
  Finalize,
}

impl fmt::Display for SyncPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SyncPhase::LoadChecklist => "load checklist",
      SyncPhase::CreateSession => "create session",
      SyncPhase::WriteResults => "write results",
      SyncPhase::Finalize => "finalize",
    };
    f.write_str(name)
  }
}

/// Errors from the synchronization protocol.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// The process sheet has no checklist bound to it.
  #[error("process {process_id} has no checklist")]
  MissingChecklist { process_id: ProcessId },

  /// The record store rejected a request.
  #[error("{phase} failed: {source}")]
  Store {
    phase: SyncPhase,
    #[source]
    source: StoreError,
  },
}

impl SyncError {
  pub(crate) fn store(phase: SyncPhase) -> impl FnOnce(StoreError) -> Self {
    move |source| SyncError::Store { phase, source }
  }

  /// The phase that failed, if a store request was involved.
  pub fn phase(&self) -> Option<SyncPhase> {
    match self {
      SyncError::MissingChecklist { .. } => None,
      SyncError::Store { phase, .. } => Some(*phase),
    }
  }
}
