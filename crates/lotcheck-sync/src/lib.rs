//! Lotcheck Sync
//!
//! Synchronizes an inspection session with the record store in four phases:
//!
//! 1. Create the session record (`running`, no result).
//! 2. Bulk-write one item result per checklist item, answered or not, and
//!    index the server-assigned result ids by checklist item.
//! 3. Upload captured photos against those result ids.
//! 4. Write the final verdict.
//!
//! Phase 3 takes a [`ResultIndex`], which only phase 2 can produce, so
//! photos can never be uploaded before their results exist.

mod client;
mod error;
mod index;
mod report;

pub use client::{ResolvedChecklist, SyncClient};
pub use error::{SyncError, SyncPhase};
pub use index::{ResultIndex, SyncState};
pub use report::{PhotoFailure, UploadReport};
