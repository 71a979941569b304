//! The execution session controller.
//!
//! Drives one run through a checklist:
//!
//! ```text
//! Initializing -> Active(index) -> Finalizing -> Confirming -> Done
//!       |                ^              |            |
//!       v                +--------------+------------+
//!    Failed
//! ```
//!
//! A failed bulk write returns to `Active(last)` with every response kept.
//! From `Confirming` any item can be re-entered; leaving `Confirming` drops
//! the synchronized result ids, so the next completion writes everything
//! again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use lotcheck_checklist::{
  CapturedValue, ChecklistItemRef, ItemResponse, PhotoBlob, ProcessId, SessionId, Verdict,
};
use lotcheck_store::{ProcessRecord, RecordStore, SessionRecord};
use lotcheck_sync::{SyncClient, SyncState, UploadReport};

use crate::accumulator::ResponseAccumulator;
use crate::confirmation::ConfirmationView;
use crate::error::SessionError;
use crate::events::{NoopNotifier, SessionEvent, SessionNotifier};
use crate::state::ControllerState;
use crate::ticker::{ElapsedTicker, format_elapsed};

/// Wizard position as `position` of `total`, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub position: usize,
  pub total: usize,
}

impl Progress {
  pub fn percent(&self) -> u8 {
    if self.total == 0 {
      return 0;
    }
    (self.position * 100 / self.total) as u8
  }
}

/// Controller for one inspection session.
pub struct ExecutionController<N: SessionNotifier = NoopNotifier> {
  sync: SyncClient,
  notifier: N,
  state: ControllerState,
  process_id: ProcessId,
  process: Option<ProcessRecord>,
  session: Option<SessionRecord>,
  items: Vec<ChecklistItemRef>,
  responses: ResponseAccumulator,
  sync_state: SyncState,
  upload_report: Option<UploadReport>,
  confirmation: Option<ConfirmationView>,
  verdict: Option<Verdict>,
  last_error: Option<String>,
  ticker: Option<ElapsedTicker>,
}

impl ExecutionController<NoopNotifier> {
  /// Start a session for a process sheet.
  ///
  /// Initialization failures leave the controller in [`ControllerState::Failed`].
  pub async fn start(store: Arc<dyn RecordStore>, process_id: ProcessId) -> Self {
    Self::start_with_notifier(store, process_id, NoopNotifier).await
  }
}

impl<N: SessionNotifier> ExecutionController<N> {
  pub async fn start_with_notifier(
    store: Arc<dyn RecordStore>,
    process_id: ProcessId,
    notifier: N,
  ) -> Self {
    let mut controller = Self {
      sync: SyncClient::new(store),
      notifier,
      state: ControllerState::Initializing,
      process_id,
      process: None,
      session: None,
      items: Vec::new(),
      responses: ResponseAccumulator::new(Vec::new()),
      sync_state: SyncState::NotSynced,
      upload_report: None,
      confirmation: None,
      verdict: None,
      last_error: None,
      ticker: None,
    };

    if let Err(e) = controller.initialize().await {
      let message = e.user_message();
      warn!(process_id = %process_id, error = %e, "session_initialization_failed");
      controller.notifier.notify(SessionEvent::SessionFailed {
        process_id,
        error: message.clone(),
      });
      controller.last_error = Some(message.clone());
      controller.state = ControllerState::Failed(message);
    }
    controller
  }

  #[instrument(name = "session_initialize", skip(self), fields(process_id = %self.process_id))]
  async fn initialize(&mut self) -> Result<(), SessionError> {
    let resolved = self
      .sync
      .load_checklist(self.process_id)
      .await
      .map_err(SessionError::Initialization)?;
    let session = self
      .sync
      .create_session(resolved.process.id, resolved.checklist.id)
      .await
      .map_err(SessionError::Initialization)?;

    self.items = resolved.checklist.items;
    self.responses = ResponseAccumulator::new(self.items.iter().map(|i| i.id).collect());
    self.process = Some(resolved.process);

    info!(
      session_id = %session.id,
      item_count = self.items.len(),
      "session_started"
    );
    self.notifier.notify(SessionEvent::SessionStarted {
      session_id: session.id,
      process_id: self.process_id,
      item_count: self.items.len(),
    });
    self.session = Some(session);
    self.ticker = Some(ElapsedTicker::start());
    self.enter(0)
  }

  // -- accessors --

  pub fn state(&self) -> &ControllerState {
    &self.state
  }

  pub fn session_id(&self) -> Option<SessionId> {
    self.session.as_ref().map(|s| s.id)
  }

  pub fn session(&self) -> Option<&SessionRecord> {
    self.session.as_ref()
  }

  pub fn process(&self) -> Option<&ProcessRecord> {
    self.process.as_ref()
  }

  pub fn items(&self) -> &[ChecklistItemRef] {
    &self.items
  }

  pub fn item_count(&self) -> usize {
    self.items.len()
  }

  /// The wizard index, while active.
  pub fn index(&self) -> Option<usize> {
    match self.state {
      ControllerState::Active(index) => Some(index),
      _ => None,
    }
  }

  /// The item on screen. `None` outside `Active` or for an empty checklist.
  pub fn current_item(&self) -> Option<&ChecklistItemRef> {
    self.index().and_then(|i| self.items.get(i))
  }

  pub fn current_response(&self) -> Option<&ItemResponse> {
    self
      .current_item()
      .and_then(|item| self.responses.get(item.id))
  }

  /// Responses of the items visited so far, in checklist order.
  pub fn responses(&self) -> Vec<&ItemResponse> {
    self.responses.get_all()
  }

  pub fn progress(&self) -> Progress {
    let total = self.items.len();
    let position = match self.state {
      ControllerState::Active(index) if total > 0 => index + 1,
      ControllerState::Finalizing | ControllerState::Confirming | ControllerState::Done => total,
      _ => 0,
    };
    Progress { position, total }
  }

  pub fn can_go_previous(&self) -> bool {
    matches!(self.state, ControllerState::Active(index) if index > 0)
  }

  pub fn sync_state(&self) -> &SyncState {
    &self.sync_state
  }

  pub fn confirmation(&self) -> Option<&ConfirmationView> {
    self.confirmation.as_ref()
  }

  /// The verdict written on confirm.
  pub fn verdict(&self) -> Option<Verdict> {
    self.verdict
  }

  /// The most recent user-facing error.
  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn upload_report(&self) -> Option<&UploadReport> {
    self.upload_report.as_ref()
  }

  /// Warning about photos that were not stored.
  pub fn warning(&self) -> Option<String> {
    self.upload_report.as_ref().and_then(UploadReport::warning)
  }

  pub fn elapsed(&self) -> Duration {
    self
      .ticker
      .as_ref()
      .map(ElapsedTicker::elapsed)
      .unwrap_or_default()
  }

  /// Whether the elapsed-time display is live.
  pub fn is_ticking(&self) -> bool {
    self.state.is_timed() && self.ticker.as_ref().is_some_and(ElapsedTicker::is_running)
  }

  pub fn elapsed_display(&self) -> String {
    format_elapsed(self.elapsed())
  }

  // -- capture --

  /// Set the current item's value. The value's kind must match the item.
  pub fn set_value(&mut self, value: Option<CapturedValue>) -> Result<(), SessionError> {
    let item = self.require_item("set a value")?;
    if let Some(value) = &value
      && value.kind() != item.kind
    {
      return Err(SessionError::ValueKind {
        expected: item.kind,
        actual: value.kind(),
      });
    }
    let id = item.id;
    self.responses.set_value(id, value)?;
    Ok(())
  }

  /// Parse raw input for the current item's kind and set it.
  pub fn set_raw_value(&mut self, raw: &str) -> Result<(), SessionError> {
    let kind = self.require_item("set a value")?.kind;
    let value = CapturedValue::parse(kind, raw)?;
    self.set_value(value)
  }

  pub fn set_comment(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
    let id = self.require_item("set a comment")?.id;
    self.responses.set_comment(id, text)?;
    Ok(())
  }

  pub fn append_photo(&mut self, photo: PhotoBlob) -> Result<(), SessionError> {
    let id = self.require_item("add a photo")?.id;
    self.responses.append_photo(id, photo)?;
    Ok(())
  }

  fn require_item(&self, operation: &'static str) -> Result<&ChecklistItemRef, SessionError> {
    self.current_item().ok_or(SessionError::InvalidState {
      operation,
      state: self.state.name(),
    })
  }

  fn require_state(
    &self,
    operation: &'static str,
    expected: fn(&ControllerState) -> bool,
  ) -> Result<(), SessionError> {
    if expected(&self.state) {
      Ok(())
    } else {
      Err(SessionError::InvalidState {
        operation,
        state: self.state.name(),
      })
    }
  }

  // -- navigation --

  /// Go to the next item, or finalize from the last one.
  pub async fn next(&mut self) -> Result<(), SessionError> {
    let ControllerState::Active(index) = self.state else {
      return Err(SessionError::InvalidState {
        operation: "go to the next item",
        state: self.state.name(),
      });
    };
    if index + 1 < self.items.len() {
      return self.enter(index + 1);
    }
    self.finalize_results().await
  }

  /// Go to the previous item. Does nothing on the first item.
  pub fn previous(&mut self) -> Result<(), SessionError> {
    match self.state {
      ControllerState::Active(0) => Ok(()),
      ControllerState::Active(index) => self.enter(index - 1),
      _ => Err(SessionError::InvalidState {
        operation: "go to the previous item",
        state: self.state.name(),
      }),
    }
  }

  /// Re-enter the wizard at `index` from the confirmation view.
  pub fn edit_item(&mut self, index: usize) -> Result<(), SessionError> {
    self.require_state("edit an item", |s| matches!(s, ControllerState::Confirming))?;
    if index >= self.items.len() {
      return Err(SessionError::ItemIndexOutOfRange {
        index,
        count: self.items.len(),
      });
    }
    self.leave_confirmation();
    self.enter(index)
  }

  /// Re-enter the wizard at the last item.
  pub fn return_to_wizard(&mut self) -> Result<(), SessionError> {
    self.require_state("return to the wizard", |s| {
      matches!(s, ControllerState::Confirming)
    })?;
    self.leave_confirmation();
    self.enter(self.last_index())
  }

  fn last_index(&self) -> usize {
    self.items.len().saturating_sub(1)
  }

  fn leave_confirmation(&mut self) {
    self.sync_state = SyncState::NotSynced;
    self.confirmation = None;
    self.upload_report = None;
  }

  fn enter(&mut self, index: usize) -> Result<(), SessionError> {
    self.state = ControllerState::Active(index);
    let (Some(item), Some(session)) = (self.items.get(index), self.session.as_ref()) else {
      return Ok(());
    };
    self.responses.visit(item.id)?;
    self.notifier.notify(SessionEvent::ItemEntered {
      session_id: session.id,
      index,
      checklist_item_id: item.id,
    });
    Ok(())
  }

  // -- synchronization --

  fn require_session_id(&self) -> Result<SessionId, SessionError> {
    self.session_id().ok_or(SessionError::InvalidState {
      operation: "synchronize",
      state: self.state.name(),
    })
  }

  /// Write every item result, upload photos and open the confirmation view.
  ///
  /// A failed write returns to the last item. A failed read-back still
  /// enters `Confirming`; call [`Self::reload_confirmation`] to retry it.
  async fn finalize_results(&mut self) -> Result<(), SessionError> {
    let session_id = self.require_session_id()?;
    self.state = ControllerState::Finalizing;
    let snapshot = self.responses.snapshot();

    let index = match self.sync.write_results(session_id, &snapshot).await {
      Ok(index) => index,
      Err(e) => {
        let error = SessionError::Sync(e);
        let message = error.user_message();
        warn!(session_id = %session_id, error = %error, "sync_failed");
        self.notifier.notify(SessionEvent::SyncFailed {
          session_id,
          error: message.clone(),
        });
        self.last_error = Some(message);
        self.state = ControllerState::Active(self.last_index());
        return Err(error);
      }
    };
    self.notifier.notify(SessionEvent::ResultsWritten {
      session_id,
      written: index.len(),
    });

    let report = self.sync.upload_photos(&index, &snapshot).await;
    if let Some(warning) = report.warning() {
      warn!(session_id = %session_id, warning = %warning, "photos_incomplete");
    }
    self.notifier.notify(SessionEvent::PhotosUploaded {
      session_id,
      uploaded: report.uploaded,
      failed: report.failures.len(),
    });

    self.sync_state = SyncState::Synced(index);
    self.upload_report = Some(report);
    self.last_error = None;
    self.state = ControllerState::Confirming;
    self.load_confirmation(session_id).await
  }

  async fn load_confirmation(&mut self, session_id: SessionId) -> Result<(), SessionError> {
    match ConfirmationView::load(self.sync.store(), session_id, &self.items).await {
      Ok(view) => {
        self.confirmation = Some(view);
        self.last_error = None;
        Ok(())
      }
      Err(e) => {
        let error = SessionError::Confirmation(e);
        warn!(session_id = %session_id, error = %error, "confirmation_load_failed");
        self.last_error = Some(error.user_message());
        Err(error)
      }
    }
  }

  /// Read the persisted results again.
  pub async fn reload_confirmation(&mut self) -> Result<(), SessionError> {
    self.require_state("reload results", |s| {
      matches!(s, ControllerState::Confirming)
    })?;
    let session_id = self.require_session_id()?;
    self.load_confirmation(session_id).await
  }

  /// Write the verdict computed from the persisted results.
  ///
  /// On failure the controller stays in `Confirming` and confirm can be
  /// called again.
  pub async fn confirm(&mut self) -> Result<Verdict, SessionError> {
    self.require_state("confirm", |s| matches!(s, ControllerState::Confirming))?;
    let session_id = self.require_session_id()?;
    let Some(view) = self.confirmation.as_ref() else {
      return Err(SessionError::InvalidState {
        operation: "confirm before the results are loaded",
        state: self.state.name(),
      });
    };
    let verdict = view.verdict();

    if let Err(e) = self.sync.finalize(session_id, verdict).await {
      let error = SessionError::Finalize(e);
      warn!(session_id = %session_id, error = %error, "finalize_failed");
      self.last_error = Some(error.user_message());
      return Err(error);
    }

    if let Some(view) = self.confirmation.as_mut() {
      view.session.result = Some(verdict);
    }
    self.verdict = Some(verdict);
    self.last_error = None;
    self.state = ControllerState::Done;
    self.stop_ticker();

    info!(session_id = %session_id, verdict = %verdict, "session_confirmed");
    self.notifier.notify(SessionEvent::SessionConfirmed {
      session_id,
      verdict,
    });
    Ok(verdict)
  }

  fn stop_ticker(&mut self) {
    if let Some(ticker) = &self.ticker {
      ticker.stop();
    }
  }

  /// Stop the elapsed ticker. The remote session is left as it is.
  pub fn teardown(&mut self) {
    self.stop_ticker();
  }
}
