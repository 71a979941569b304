use lotcheck_checklist::{ExecutionStatus, ItemKind, SessionId, ValueError};
use lotcheck_store::StoreError;
use lotcheck_sync::SyncError;

use crate::accumulator::UnknownItem;

/// Errors surfaced by the execution controller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  /// The session could not be started. Terminal.
  #[error("initialization failed: {0}")]
  Initialization(#[source] SyncError),

  /// Writing item results failed. Responses are kept for a retry.
  #[error("sync failed: {0}")]
  Sync(#[source] SyncError),

  /// Writing the verdict failed. Confirming again is safe.
  #[error("finalize failed: {0}")]
  Finalize(#[source] SyncError),

  /// The persisted results could not be read back.
  #[error("failed to load results: {0}")]
  Confirmation(#[source] StoreError),

  /// Only completed sessions can be confirmed.
  #[error("session {session_id} is {status}, not completed")]
  NotCompleted {
    session_id: SessionId,
    status: ExecutionStatus,
  },

  /// The session does not hold one result per checklist item.
  #[error("session {session_id} has {actual} item results, expected {expected}")]
  MissingResults {
    session_id: SessionId,
    expected: usize,
    actual: usize,
  },

  /// The operation is not available in the current state.
  #[error("cannot {operation} while {state}")]
  InvalidState {
    operation: &'static str,
    state: &'static str,
  },

  /// The value does not match the current item's kind.
  #[error("this item takes {} value", with_article(expected.label()))]
  ValueKind { expected: ItemKind, actual: ItemKind },

  /// The raw input could not be captured for the current item.
  #[error("invalid value: {0}")]
  InvalidValue(#[from] ValueError),

  #[error(transparent)]
  UnknownItem(#[from] UnknownItem),

  #[error("item index {index} is out of range for {count} items")]
  ItemIndexOutOfRange { index: usize, count: usize },
}

fn with_article(word: &str) -> String {
  match word.chars().next() {
    Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {}", word),
    _ => format!("a {}", word),
  }
}

impl SessionError {
  /// The message shown to the user for this error.
  pub fn user_message(&self) -> String {
    match self {
      SessionError::Initialization(SyncError::MissingChecklist { .. }) => {
        "No checklist is assigned to this process.".to_string()
      }
      SessionError::Initialization(e) => format!("Could not start the inspection ({}).", e),
      SessionError::Sync(_) => {
        "Saving the results failed. Your answers are kept; complete the checklist again to retry."
          .to_string()
      }
      SessionError::Finalize(_) => "Saving the verdict failed. Confirm again to retry.".to_string(),
      SessionError::Confirmation(_) => "Could not load the saved results.".to_string(),
      other => other.to_string(),
    }
  }
}
