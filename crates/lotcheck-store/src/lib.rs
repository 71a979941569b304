//! Lotcheck Store
//!
//! This crate provides the record-store contract used by the execution core
//! and two implementations of it:
//! - [`SqliteRecordStore`]: a local SQLite database
//! - [`HttpRecordStore`]: the REST backend that owns process sheets,
//!   checklists and execution records
//!
//! The [`RecordStore`] trait covers exactly what an inspection run needs:
//! - Resolving a process sheet's checklist and its ordered items
//! - Creating an execution session
//! - Bulk-writing item results and uploading photos
//! - Reading a session back and writing its final verdict

mod http;
mod sqlite;
mod types;

pub use http::HttpRecordStore;
pub use sqlite::SqliteRecordStore;
pub use types::{
  ChecklistRecord, ItemResultRecord, ItemResultsWrite, ItemWrite, NewSession, PhotoUpload,
  ProcessRecord, SessionRecord, fallback_item_title,
};

use async_trait::async_trait;
use lotcheck_checklist::{ChecklistId, ExecutionStatus, ProcessId, SessionId, Verdict};

/// Error type for record-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying the embedded schema migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// The HTTP request could not be performed.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The configured base URL is not usable.
  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),

  /// The backend answered with a non-success status.
  #[error("unexpected status {status}: {body}")]
  UnexpectedStatus { status: u16, body: String },

  /// A stored or returned record could not be interpreted.
  #[error("invalid record: {message}")]
  InvalidRecord { message: String },

  /// A write would move a session's status backwards.
  #[error("session status cannot move from {from} to {to}")]
  StatusRegression {
    from: ExecutionStatus,
    to: ExecutionStatus,
  },
}

/// Storage contract for inspection execution.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Read a process sheet, including its checklist binding.
  async fn get_process(&self, process_id: ProcessId) -> Result<ProcessRecord, StoreError>;

  /// Read a checklist with its items in checklist order.
  async fn get_checklist(&self, checklist_id: ChecklistId) -> Result<ChecklistRecord, StoreError>;

  /// Create a running session with no result.
  async fn create_session(&self, session: &NewSession) -> Result<SessionRecord, StoreError>;

  /// Replace a session's item results in one request.
  ///
  /// Returns the written results carrying their server-assigned ids.
  async fn write_item_results(
    &self,
    session_id: SessionId,
    write: &ItemResultsWrite,
  ) -> Result<Vec<ItemResultRecord>, StoreError>;

  /// Attach one photo to a persisted item result.
  async fn upload_photo(&self, upload: &PhotoUpload<'_>) -> Result<(), StoreError>;

  /// Read a session record.
  async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StoreError>;

  /// List the persisted item results of a session.
  async fn list_item_results(
    &self,
    session_id: SessionId,
  ) -> Result<Vec<ItemResultRecord>, StoreError>;

  /// Write the final verdict. Idempotent.
  async fn finalize_session(&self, session_id: SessionId, verdict: Verdict)
  -> Result<(), StoreError>;
}
