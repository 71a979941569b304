//! Lotcheck Checklist
//!
//! Core data model for executing an inspection checklist against a
//! manufacturing lot:
//! - [`ChecklistItemRef`]: one immutable item definition
//! - [`CapturedValue`]: the kind-tagged value recorded for an item
//! - [`ItemResponse`]: value, comment and photos captured for one item
//! - [`infer_status`]: maps a captured value to [`ItemStatus`]
//! - [`Verdict`]: reduces item statuses to a session-level outcome
//!
//! Everything in this crate is pure and synchronous. Persistence and
//! orchestration live in `lotcheck-store`, `lotcheck-sync` and
//! `lotcheck-session`.

mod ids;
mod item;
mod response;
mod session;
mod status;
mod value;
mod verdict;

pub use ids::{ChecklistId, ChecklistItemId, ItemResultId, ProcessId, SessionId};
pub use item::{ChecklistItemRef, ItemKind};
pub use response::{ItemResponse, PhotoBlob};
pub use session::ExecutionStatus;
pub use status::{ItemStatus, infer_status};
pub use value::{CapturedValue, EnumeratedChoice, NumericValue, ValueError};
pub use verdict::{StatusTally, Verdict};
