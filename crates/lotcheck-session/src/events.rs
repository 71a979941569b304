//! Session events and notifiers.
//!
//! The controller publishes lifecycle events so a UI can follow progress
//! without polling.

use lotcheck_checklist::{ChecklistItemId, ProcessId, SessionId, Verdict};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the execution controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
  /// The session was created and the wizard opened.
  SessionStarted {
    session_id: SessionId,
    process_id: ProcessId,
    item_count: usize,
  },

  /// Initialization failed; the wizard will not open.
  SessionFailed { process_id: ProcessId, error: String },

  /// The wizard moved to an item.
  ItemEntered {
    session_id: SessionId,
    index: usize,
    checklist_item_id: ChecklistItemId,
  },

  /// Item results were written.
  ResultsWritten { session_id: SessionId, written: usize },

  /// Writing item results failed; responses are kept for a retry.
  SyncFailed { session_id: SessionId, error: String },

  /// Photo uploads finished.
  PhotosUploaded {
    session_id: SessionId,
    uploaded: usize,
    failed: usize,
  },

  /// The final verdict was written.
  SessionConfirmed {
    session_id: SessionId,
    verdict: Verdict,
  },
}

/// Receives session events.
pub trait SessionNotifier: Send + Sync {
  /// Called for every event the controller emits.
  fn notify(&self, event: SessionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl SessionNotifier for NoopNotifier {
  fn notify(&self, _event: SessionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
    Self { sender }
  }
}

impl SessionNotifier for ChannelNotifier {
  fn notify(&self, event: SessionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
