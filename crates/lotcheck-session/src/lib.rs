//! Lotcheck Session
//!
//! The inspection wizard: an [`ExecutionController`] walks one checklist
//! item at a time, captures responses into its own [`ResponseAccumulator`],
//! synchronizes them through `lotcheck-sync` on completion and presents the
//! persisted results in a [`ConfirmationView`] until the verdict is
//! confirmed.

mod accumulator;
mod confirmation;
mod controller;
mod error;
mod events;
mod state;
mod ticker;

pub use accumulator::{ResponseAccumulator, UnknownItem};
pub use confirmation::{ConfirmationRow, ConfirmationView};
pub use controller::{ExecutionController, Progress};
pub use error::SessionError;
pub use events::{ChannelNotifier, NoopNotifier, SessionEvent, SessionNotifier};
pub use state::ControllerState;
pub use ticker::{ElapsedTicker, format_elapsed};
