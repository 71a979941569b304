//! End-to-end controller runs against an in-memory SQLite store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use lotcheck_checklist::{
  CapturedValue, ChecklistId, ChecklistItemId, ChecklistItemRef, EnumeratedChoice,
  ExecutionStatus, ItemKind, ItemStatus, PhotoBlob, ProcessId, SessionId, Verdict,
};
use lotcheck_session::{
  ChannelNotifier, ConfirmationView, ControllerState, ExecutionController, SessionError,
  SessionEvent,
};
use lotcheck_store::{
  ChecklistRecord, ItemResultRecord, ItemResultsWrite, ItemWrite, NewSession, PhotoUpload,
  ProcessRecord, RecordStore, SessionRecord, SqliteRecordStore, StoreError,
};

const PROCESS: ProcessId = ProcessId(1);

fn item(id: i64, title: &str, kind: ItemKind, unit: Option<&str>) -> ChecklistItemRef {
  ChecklistItemRef {
    id: ChecklistItemId(id),
    title: title.to_string(),
    instruction: String::new(),
    kind,
    unit: unit.map(str::to_string),
    reference_image: None,
  }
}

fn three_items() -> Vec<ChecklistItemRef> {
  vec![
    item(10, "Width", ItemKind::Numeric, Some("mm")),
    item(11, "Surface", ItemKind::Enumerated, None),
    item(12, "Remarks", ItemKind::FreeText, None),
  ]
}

async fn seeded(items: Vec<ChecklistItemRef>) -> Arc<SqliteRecordStore> {
  let store = SqliteRecordStore::in_memory().await.unwrap();
  store
    .insert_checklist(&ChecklistRecord {
      id: ChecklistId(1),
      name: "Initial lot".to_string(),
      items,
    })
    .await
    .unwrap();
  store
    .insert_process(&ProcessRecord {
      id: PROCESS,
      name: "Bracket A".to_string(),
      lot_number: "L-001".to_string(),
      assignee: String::new(),
      checklist_id: Some(ChecklistId(1)),
    })
    .await
    .unwrap();
  Arc::new(store)
}

/// Answer each item in turn with raw text and complete the wizard.
async fn run_answers<N: lotcheck_session::SessionNotifier>(
  controller: &mut ExecutionController<N>,
  answers: &[&str],
) {
  for answer in answers {
    controller.set_raw_value(answer).unwrap();
    controller.next().await.unwrap();
  }
}

fn statuses(controller: &ExecutionController<impl lotcheck_session::SessionNotifier>) -> Vec<ItemStatus> {
  controller
    .confirmation()
    .unwrap()
    .rows
    .iter()
    .map(|r| r.status)
    .collect()
}

/// Failure plan for [`FlakyStore`]: each counter fails that many calls.
#[derive(Default)]
struct FailurePlan {
  writes: usize,
  uploads: usize,
  finalizes: usize,
  session_reads: usize,
}

fn take(counter: &mut usize) -> bool {
  if *counter > 0 {
    *counter -= 1;
    true
  } else {
    false
  }
}

fn injected() -> StoreError {
  StoreError::UnexpectedStatus {
    status: 503,
    body: "unavailable".to_string(),
  }
}

/// Wraps the SQLite store and fails calls according to a plan.
struct FlakyStore {
  inner: Arc<SqliteRecordStore>,
  plan: Mutex<FailurePlan>,
}

impl FlakyStore {
  fn new(inner: Arc<SqliteRecordStore>, plan: FailurePlan) -> Arc<Self> {
    Arc::new(Self {
      inner,
      plan: Mutex::new(plan),
    })
  }

  fn fails(&self, pick: impl FnOnce(&mut FailurePlan) -> &mut usize) -> bool {
    let mut plan = self.plan.lock().unwrap();
    take(pick(&mut *plan))
  }
}

#[async_trait]
impl RecordStore for FlakyStore {
  async fn get_process(&self, process_id: ProcessId) -> Result<ProcessRecord, StoreError> {
    self.inner.get_process(process_id).await
  }

  async fn get_checklist(&self, checklist_id: ChecklistId) -> Result<ChecklistRecord, StoreError> {
    self.inner.get_checklist(checklist_id).await
  }

  async fn create_session(&self, session: &NewSession) -> Result<SessionRecord, StoreError> {
    self.inner.create_session(session).await
  }

  async fn write_item_results(
    &self,
    session_id: SessionId,
    write: &ItemResultsWrite,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    if self.fails(|p| &mut p.writes) {
      return Err(injected());
    }
    self.inner.write_item_results(session_id, write).await
  }

  async fn upload_photo(&self, upload: &PhotoUpload<'_>) -> Result<(), StoreError> {
    if self.fails(|p| &mut p.uploads) {
      return Err(injected());
    }
    self.inner.upload_photo(upload).await
  }

  async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StoreError> {
    if self.fails(|p| &mut p.session_reads) {
      return Err(injected());
    }
    self.inner.get_session(session_id).await
  }

  async fn list_item_results(
    &self,
    session_id: SessionId,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    self.inner.list_item_results(session_id).await
  }

  async fn finalize_session(
    &self,
    session_id: SessionId,
    verdict: Verdict,
  ) -> Result<(), StoreError> {
    if self.fails(|p| &mut p.finalizes) {
      return Err(injected());
    }
    self.inner.finalize_session(session_id, verdict).await
  }
}

#[tokio::test]
async fn test_blank_item_warns() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;
  assert_eq!(controller.state(), &ControllerState::Active(0));
  assert_eq!(controller.current_item().unwrap().unit.as_deref(), Some("mm"));

  run_answers(&mut controller, &["10.5", "", "ok"]).await;

  assert_eq!(controller.state(), &ControllerState::Confirming);
  assert_eq!(
    statuses(&controller),
    vec![ItemStatus::Ok, ItemStatus::Skip, ItemStatus::Ok]
  );
  let view = controller.confirmation().unwrap();
  assert_eq!(view.verdict(), Verdict::Warn);
  assert_eq!(view.rows[0].value, "10.5");
  assert_eq!(view.rows[0].title, "Width");
  assert_eq!(view.session.result, None);

  assert_eq!(controller.confirm().await.unwrap(), Verdict::Warn);
  assert_eq!(controller.state(), &ControllerState::Done);
  assert!(!controller.is_ticking());

  let session_id = controller.session_id().unwrap();
  let stored = store.get_session(session_id).await.unwrap();
  assert_eq!(stored.result, Some(Verdict::Warn));
}

#[tokio::test]
async fn test_fail_overrides_other_statuses() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;

  run_answers(&mut controller, &["10.5", "fail", "ok"]).await;

  assert_eq!(
    statuses(&controller),
    vec![ItemStatus::Ok, ItemStatus::Ng, ItemStatus::Ok]
  );
  assert_eq!(controller.confirmation().unwrap().verdict(), Verdict::Fail);
}

#[tokio::test]
async fn test_all_answered_passes() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;

  run_answers(&mut controller, &["9.98", "caution", "looks fine"]).await;

  let view = controller.confirmation().unwrap();
  assert_eq!(view.tally.ok, 3);
  assert_eq!(view.verdict(), Verdict::Pass);
  assert_eq!(view.display_label(), Verdict::Pass);
}

#[tokio::test]
async fn test_empty_checklist_passes() {
  let store = seeded(Vec::new()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;

  assert_eq!(controller.state(), &ControllerState::Active(0));
  assert!(controller.current_item().is_none());
  assert_eq!(controller.progress().position, 0);
  assert!(matches!(
    controller.set_raw_value("x"),
    Err(SessionError::InvalidState { .. })
  ));

  controller.next().await.unwrap();
  assert_eq!(controller.state(), &ControllerState::Confirming);
  assert!(controller.confirmation().unwrap().rows.is_empty());
  assert_eq!(controller.confirm().await.unwrap(), Verdict::Pass);
}

#[tokio::test]
async fn test_every_item_gets_a_result() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;

  controller.set_raw_value("10.5").unwrap();
  controller.set_comment("measured twice").unwrap();
  controller.next().await.unwrap();
  controller.next().await.unwrap();
  controller.next().await.unwrap();

  let session_id = controller.session_id().unwrap();
  let results = store.list_item_results(session_id).await.unwrap();
  assert_eq!(results.len(), 3);
  assert_eq!(results[0].value, "10.5");
  assert_eq!(results[0].note, "measured twice");
  assert_eq!(results[1].value, "");
  assert_eq!(results[1].status, ItemStatus::Skip);
  assert_eq!(results[2].status, ItemStatus::Skip);
}

#[tokio::test]
async fn test_unbound_process_fails_initialization() {
  let store = seeded(three_items()).await;
  store
    .insert_process(&ProcessRecord {
      id: ProcessId(2),
      name: "Unbound".to_string(),
      lot_number: String::new(),
      assignee: String::new(),
      checklist_id: None,
    })
    .await
    .unwrap();

  let mut controller = ExecutionController::start(store, ProcessId(2)).await;

  assert!(matches!(controller.state(), ControllerState::Failed(_)));
  assert_eq!(
    controller.last_error(),
    Some("No checklist is assigned to this process.")
  );
  assert!(controller.session_id().is_none());
  assert!(!controller.is_ticking());
  assert!(controller.next().await.is_err());
}

#[tokio::test]
async fn test_missing_process_fails_initialization() {
  let store = seeded(three_items()).await;
  let controller = ExecutionController::start(store, ProcessId(99)).await;
  assert!(matches!(controller.state(), ControllerState::Failed(_)));
  assert!(controller.last_error().is_some());
}

#[tokio::test]
async fn test_navigation_bounds() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;

  assert!(!controller.can_go_previous());
  controller.previous().unwrap();
  assert_eq!(controller.index(), Some(0));

  controller.next().await.unwrap();
  assert!(controller.can_go_previous());
  assert_eq!(controller.progress().position, 2);
  assert_eq!(controller.progress().percent(), 66);

  controller.previous().unwrap();
  assert_eq!(controller.index(), Some(0));
  assert_eq!(controller.responses().len(), 2);
}

#[tokio::test]
async fn test_value_kind_must_match_item() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;

  let err = controller
    .set_value(Some(CapturedValue::Text("wide".to_string())))
    .unwrap_err();
  assert!(matches!(
    err,
    SessionError::ValueKind {
      expected: ItemKind::Numeric,
      actual: ItemKind::FreeText
    }
  ));
  assert!(matches!(
    controller.set_raw_value("ten"),
    Err(SessionError::InvalidValue(_))
  ));

  controller.next().await.unwrap();
  controller
    .set_value(Some(CapturedValue::Enumerated(EnumeratedChoice::Fail)))
    .unwrap();
  assert_eq!(controller.current_response().unwrap().status(), ItemStatus::Ng);
}

#[tokio::test]
async fn test_sync_failure_keeps_responses_for_retry() {
  let inner = seeded(three_items()).await;
  let store = FlakyStore::new(
    inner.clone(),
    FailurePlan {
      writes: 1,
      ..Default::default()
    },
  );
  let mut controller = ExecutionController::start(store, PROCESS).await;

  controller.set_raw_value("10.5").unwrap();
  controller.next().await.unwrap();
  controller.set_raw_value("pass").unwrap();
  controller.next().await.unwrap();
  controller.set_comment("edge chipped").unwrap();

  let err = controller.next().await.unwrap_err();
  assert!(matches!(err, SessionError::Sync(_)));
  assert_eq!(controller.state(), &ControllerState::Active(2));
  assert!(controller.last_error().unwrap().contains("answers are kept"));
  assert!(!controller.sync_state().is_synced());
  assert_eq!(controller.current_response().unwrap().comment, "edge chipped");

  controller.next().await.unwrap();
  assert_eq!(controller.state(), &ControllerState::Confirming);
  assert!(controller.last_error().is_none());
  let view = controller.confirmation().unwrap();
  assert_eq!(view.rows.len(), 3);
  assert_eq!(view.rows[2].comment, "edge chipped");
}

#[tokio::test]
async fn test_partial_photo_upload_warns() {
  let inner = seeded(three_items()).await;
  let store = FlakyStore::new(
    inner.clone(),
    FailurePlan {
      uploads: 1,
      ..Default::default()
    },
  );
  let mut controller = ExecutionController::start(store, PROCESS).await;

  controller.set_raw_value("10.5").unwrap();
  controller
    .append_photo(PhotoBlob::new(vec![0x89, 0x50], "image/png").with_annotation("front"))
    .unwrap();
  controller
    .append_photo(PhotoBlob::new(vec![0x89, 0x51], "image/png").with_annotation("back"))
    .unwrap();
  run_answers(&mut controller, &["10.5", "pass", "ok"]).await;

  assert_eq!(controller.state(), &ControllerState::Confirming);
  let report = controller.upload_report().unwrap();
  assert_eq!(report.uploaded, 1);
  assert_eq!(report.failures.len(), 1);
  assert!(controller.warning().is_some());

  let session_id = controller.session_id().unwrap();
  assert_eq!(inner.photo_count(session_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_finalize_failure_allows_retry() {
  let inner = seeded(three_items()).await;
  let store = FlakyStore::new(
    inner.clone(),
    FailurePlan {
      finalizes: 1,
      ..Default::default()
    },
  );
  let mut controller = ExecutionController::start(store, PROCESS).await;
  run_answers(&mut controller, &["10.5", "fail", "ok"]).await;

  let err = controller.confirm().await.unwrap_err();
  assert!(matches!(err, SessionError::Finalize(_)));
  assert_eq!(controller.state(), &ControllerState::Confirming);
  assert_eq!(controller.confirmation().unwrap().verdict(), Verdict::Fail);

  assert_eq!(controller.confirm().await.unwrap(), Verdict::Fail);
  assert_eq!(controller.verdict(), Some(Verdict::Fail));
  let stored = inner
    .get_session(controller.session_id().unwrap())
    .await
    .unwrap();
  assert_eq!(stored.result, Some(Verdict::Fail));
}

#[tokio::test]
async fn test_read_back_failure_can_be_reloaded() {
  let inner = seeded(three_items()).await;
  let store = FlakyStore::new(
    inner,
    FailurePlan {
      session_reads: 1,
      ..Default::default()
    },
  );
  let mut controller = ExecutionController::start(store, PROCESS).await;
  controller.set_raw_value("10.5").unwrap();
  controller.next().await.unwrap();
  controller.next().await.unwrap();

  let err = controller.next().await.unwrap_err();
  assert!(matches!(err, SessionError::Confirmation(_)));
  assert_eq!(controller.state(), &ControllerState::Confirming);
  assert!(controller.confirmation().is_none());
  assert!(matches!(
    controller.confirm().await,
    Err(SessionError::InvalidState { .. })
  ));

  controller.reload_confirmation().await.unwrap();
  assert_eq!(controller.confirm().await.unwrap(), Verdict::Warn);
}

#[tokio::test]
async fn test_edit_from_confirmation_rewrites_results() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;
  run_answers(&mut controller, &["10.5", "fail", "ok"]).await;
  let row = controller
    .confirmation()
    .unwrap()
    .rows
    .iter()
    .position(|r| r.status == ItemStatus::Ng)
    .unwrap();
  let index = controller.confirmation().unwrap().index_of_row(row).unwrap();
  assert_eq!(index, 1);

  assert!(matches!(
    controller.edit_item(7),
    Err(SessionError::ItemIndexOutOfRange { index: 7, count: 3 })
  ));
  controller.edit_item(index).unwrap();
  assert_eq!(controller.state(), &ControllerState::Active(1));
  assert!(!controller.sync_state().is_synced());
  assert!(controller.confirmation().is_none());

  controller.set_raw_value("pass").unwrap();
  controller.next().await.unwrap();
  controller.next().await.unwrap();

  let view = controller.confirmation().unwrap();
  assert_eq!(view.rows.len(), 3);
  assert_eq!(view.verdict(), Verdict::Pass);
  let results = store
    .list_item_results(controller.session_id().unwrap())
    .await
    .unwrap();
  assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_return_to_wizard_enters_last_item() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;
  assert!(controller.return_to_wizard().is_err());

  run_answers(&mut controller, &["1", "pass", "ok"]).await;
  controller.return_to_wizard().unwrap();
  assert_eq!(controller.state(), &ControllerState::Active(2));
  assert_eq!(controller.current_response().unwrap().value_text(), "ok");
}

#[tokio::test]
async fn test_teardown_stops_ticker() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store, PROCESS).await;
  assert!(controller.is_ticking());
  assert_eq!(controller.elapsed_display(), "0m00s");

  controller.teardown();
  assert!(!controller.is_ticking());
}

#[tokio::test]
async fn test_stored_confirm_refuses_running_session() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;
  let session_id = controller.session_id().unwrap();
  controller.teardown();
  drop(controller);

  let result = ConfirmationView::confirm_stored(store.clone(), session_id).await;
  assert!(matches!(
    result,
    Err(SessionError::NotCompleted {
      status: ExecutionStatus::Running,
      ..
    })
  ));

  let stored = store.get_session(session_id).await.unwrap();
  assert_eq!(stored.status, ExecutionStatus::Running);
  assert_eq!(stored.result, None);
}

#[tokio::test]
async fn test_stored_confirm_refuses_missing_results() {
  let store = seeded(three_items()).await;
  let session = store
    .create_session(&NewSession {
      process_id: PROCESS,
      checklist_id: ChecklistId(1),
      started_at: Utc::now(),
    })
    .await
    .unwrap();
  store
    .write_item_results(
      session.id,
      &ItemResultsWrite {
        status: ExecutionStatus::Completed,
        finished_at: Utc::now(),
        items: vec![ItemWrite {
          checklist_item_id: ChecklistItemId(10),
          value: "10.5".to_string(),
          note: String::new(),
          status: ItemStatus::Ok,
        }],
      },
    )
    .await
    .unwrap();

  let result = ConfirmationView::confirm_stored(store.clone(), session.id).await;
  assert!(matches!(
    result,
    Err(SessionError::MissingResults {
      expected: 3,
      actual: 1,
      ..
    })
  ));
  assert_eq!(store.get_session(session.id).await.unwrap().result, None);
}

#[tokio::test]
async fn test_stored_confirm_writes_verdict() {
  let store = seeded(three_items()).await;
  let mut controller = ExecutionController::start(store.clone(), PROCESS).await;
  run_answers(&mut controller, &["10.5", "", "ok"]).await;
  let session_id = controller.session_id().unwrap();
  drop(controller);

  let view = ConfirmationView::confirm_stored(store.clone(), session_id)
    .await
    .unwrap();
  assert_eq!(view.verdict(), Verdict::Warn);
  assert_eq!(view.session.result, Some(Verdict::Warn));
  assert_eq!(
    store.get_session(session_id).await.unwrap().result,
    Some(Verdict::Warn)
  );
}

#[tokio::test]
async fn test_notifier_receives_lifecycle_events() {
  let store = seeded(three_items()).await;
  let (tx, mut rx) = mpsc::unbounded_channel();
  let mut controller =
    ExecutionController::start_with_notifier(store, PROCESS, ChannelNotifier::new(tx)).await;
  run_answers(&mut controller, &["10.5", "pass", "ok"]).await;
  controller.confirm().await.unwrap();

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  assert!(matches!(
    events[0],
    SessionEvent::SessionStarted { item_count: 3, .. }
  ));
  let entered = events
    .iter()
    .filter(|e| matches!(e, SessionEvent::ItemEntered { .. }))
    .count();
  assert_eq!(entered, 3);
  assert!(events.iter().any(|e| matches!(e, SessionEvent::ResultsWritten { written: 3, .. })));
  assert!(matches!(
    events.last(),
    Some(SessionEvent::SessionConfirmed {
      verdict: Verdict::Pass,
      ..
    })
  ));
}
