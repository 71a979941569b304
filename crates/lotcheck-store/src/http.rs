//! REST-backed record store.
//!
//! Talks to the inspection backend's JSON API. Related records come back
//! either as a bare id or as a nested object depending on the endpoint,
//! so the wire types accept both.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use lotcheck_checklist::{
  ChecklistId, ChecklistItemId, ChecklistItemRef, ExecutionStatus, ItemKind, ItemResultId,
  ItemStatus, ProcessId, SessionId, Verdict,
};

use crate::types::{fallback_item_title, non_empty};
use crate::{
  ChecklistRecord, ItemResultRecord, ItemResultsWrite, NewSession, PhotoUpload, ProcessRecord,
  RecordStore, SessionRecord, StoreError,
};

/// Record store backed by the inspection REST API.
pub struct HttpRecordStore {
  client: Client,
  base_url: Url,
}

impl HttpRecordStore {
  /// Create a store for the API rooted at `base_url` (e.g. `http://host/api/`).
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
      base.push('/');
    }
    let client = Client::builder()
      .user_agent(concat!("lotcheck/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()?;

    Ok(Self {
      client,
      base_url: Url::parse(&base)?,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn url(&self, path: &str) -> Result<Url, StoreError> {
    Ok(self.base_url.join(path)?)
  }

  /// Send a request and decode a JSON body.
  async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
    let body = self.send(request).await?;
    serde_json::from_str(&body).map_err(|e| StoreError::InvalidRecord {
      message: format!("failed to decode response: {}", e),
    })
  }

  /// Send a request, returning the body text of a successful response.
  async fn send(&self, request: RequestBuilder) -> Result<String, StoreError> {
    let response = request.send().await?;
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;

    if status == StatusCode::NOT_FOUND {
      return Err(StoreError::NotFound(url));
    }
    if !status.is_success() {
      return Err(StoreError::UnexpectedStatus {
        status: status.as_u16(),
        body,
      });
    }
    Ok(body)
  }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
  #[instrument(skip(self), fields(process_id = %process_id))]
  async fn get_process(&self, process_id: ProcessId) -> Result<ProcessRecord, StoreError> {
    let url = self.url(&format!("process-sheets/{}/", process_id))?;
    let wire: WireProcess = self.send_json(self.client.get(url)).await?;
    Ok(wire.into_record())
  }

  #[instrument(skip(self), fields(checklist_id = %checklist_id))]
  async fn get_checklist(&self, checklist_id: ChecklistId) -> Result<ChecklistRecord, StoreError> {
    let url = self.url(&format!("checklists/{}/", checklist_id))?;
    let wire: WireChecklist = self.send_json(self.client.get(url)).await?;
    Ok(wire.into_record())
  }

  #[instrument(skip(self, session), fields(process_id = %session.process_id))]
  async fn create_session(&self, session: &NewSession) -> Result<SessionRecord, StoreError> {
    let url = self.url("executions/")?;
    let body = create_body(session);
    let wire: WireExecution = self.send_json(self.client.post(url).json(&body)).await?;
    wire.into_record()
  }

  #[instrument(skip(self, write), fields(session_id = %session_id, items = write.items.len()))]
  async fn write_item_results(
    &self,
    session_id: SessionId,
    write: &ItemResultsWrite,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    let url = self.url(&format!("executions/{}/", session_id))?;
    let body = write_body(write);
    let wire: WireExecution = self.send_json(self.client.patch(url).json(&body)).await?;
    debug!(returned = wire.item_results.len(), "item_results_written");
    wire
      .item_results
      .into_iter()
      .map(WireItemResult::into_record)
      .collect()
  }

  #[instrument(skip(self, upload), fields(item_result_id = %upload.item_result_id))]
  async fn upload_photo(&self, upload: &PhotoUpload<'_>) -> Result<(), StoreError> {
    let url = self.url("execution-photos/")?;
    let image = Part::bytes(upload.image.to_vec())
      .file_name(photo_file_name(upload.mime_type))
      .mime_str(upload.mime_type)?;
    let form = Form::new()
      .text("item_result", upload.item_result_id.to_string())
      .part("image", image)
      .text("annotation", upload.annotation.to_string());

    self.send(self.client.post(url).multipart(form)).await?;
    Ok(())
  }

  #[instrument(skip(self), fields(session_id = %session_id))]
  async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StoreError> {
    let url = self.url(&format!("executions/{}/", session_id))?;
    let wire: WireExecution = self.send_json(self.client.get(url)).await?;
    wire.into_record()
  }

  #[instrument(skip(self), fields(session_id = %session_id))]
  async fn list_item_results(
    &self,
    session_id: SessionId,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    let mut url = self.url("execution-item-results/")?;
    url
      .query_pairs_mut()
      .append_pair("execution", &session_id.to_string());

    let mut results = Vec::new();
    let mut next = Some(url);
    while let Some(page_url) = next.take() {
      let page: WireList<WireItemResult> = self.send_json(self.client.get(page_url)).await?;
      let (items, next_page) = page.into_parts();
      for item in items {
        results.push(item.into_record()?);
      }
      next = next_page.map(|n| Url::parse(&n)).transpose()?;
    }
    Ok(results)
  }

  #[instrument(skip(self), fields(session_id = %session_id, verdict = %verdict))]
  async fn finalize_session(
    &self,
    session_id: SessionId,
    verdict: Verdict,
  ) -> Result<(), StoreError> {
    let url = self.url(&format!("executions/{}/", session_id))?;
    let body = json!({ "result": verdict });
    self.send(self.client.patch(url).json(&body)).await?;
    Ok(())
  }
}

/// Body of `POST executions/`. New sessions are running with no result.
fn create_body(session: &NewSession) -> serde_json::Value {
  json!({
    "process_sheet_id": session.process_id,
    "checklist_id": session.checklist_id,
    "status": ExecutionStatus::Running,
    "result": "",
    "started_at": session.started_at,
  })
}

/// Body of the bulk `PATCH executions/{id}/`.
fn write_body(write: &ItemResultsWrite) -> serde_json::Value {
  json!({
    "status": write.status,
    "finished_at": write.finished_at,
    "item_results_write": write.items,
  })
}

fn photo_file_name(mime_type: &str) -> String {
  let extension = match mime_type {
    "image/png" => "png",
    "image/jpeg" => "jpg",
    "image/gif" => "gif",
    "image/webp" => "webp",
    _ => "bin",
  };
  format!("photo.{}", extension)
}

fn invalid<E: std::fmt::Display>(field: &str) -> impl FnOnce(E) -> StoreError + '_ {
  move |e| StoreError::InvalidRecord {
    message: format!("{}: {}", field, e),
  }
}

/// A related record: either its id or the nested object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Related<T> {
  Id(i64),
  Object(T),
}

#[derive(Debug, Deserialize)]
struct WireId {
  id: i64,
}

impl Related<WireId> {
  fn id(&self) -> i64 {
    match self {
      Related::Id(id) => *id,
      Related::Object(o) => o.id,
    }
  }
}

#[derive(Debug, Deserialize)]
struct WireProcess {
  id: i64,
  #[serde(default)]
  name: String,
  #[serde(default)]
  lot_number: String,
  #[serde(default)]
  assignee: String,
  #[serde(default)]
  checklist: Option<Related<WireId>>,
}

impl WireProcess {
  fn into_record(self) -> ProcessRecord {
    ProcessRecord {
      id: ProcessId(self.id),
      name: self.name,
      lot_number: self.lot_number,
      assignee: self.assignee,
      checklist_id: self.checklist.map(|c| ChecklistId(c.id())),
    }
  }
}

#[derive(Debug, Deserialize)]
struct WireCheckItem {
  id: i64,
  #[serde(default)]
  name: String,
  #[serde(default, rename = "type")]
  kind: String,
  #[serde(default)]
  unit: String,
  #[serde(default)]
  description: String,
  #[serde(default)]
  reference_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChecklistItem {
  id: i64,
  check_item: Related<WireCheckItem>,
  #[serde(default)]
  order: i64,
  #[serde(default)]
  instruction: String,
  #[serde(default)]
  unit: String,
}

impl WireChecklistItem {
  fn into_item(self) -> ChecklistItemRef {
    let id = ChecklistItemId(self.id);
    let master = match self.check_item {
      Related::Object(master) => Some(master),
      Related::Id(_) => None,
    };

    let title = master
      .as_ref()
      .and_then(|m| non_empty(&m.name))
      .unwrap_or_else(|| fallback_item_title(id));
    let instruction = non_empty(&self.instruction)
      .or_else(|| master.as_ref().and_then(|m| non_empty(&m.description)))
      .unwrap_or_default();
    let kind = master
      .as_ref()
      .map(|m| ItemKind::from_master_type(&m.kind))
      .unwrap_or(ItemKind::FreeText);
    let unit = non_empty(&self.unit).or_else(|| master.as_ref().and_then(|m| non_empty(&m.unit)));
    let reference_image = master
      .and_then(|m| m.reference_image)
      .and_then(|r| non_empty(&r));

    ChecklistItemRef {
      id,
      title,
      instruction,
      kind,
      unit,
      reference_image,
    }
  }
}

#[derive(Debug, Deserialize)]
struct WireChecklist {
  id: i64,
  #[serde(default)]
  name: String,
  #[serde(default)]
  items: Vec<WireChecklistItem>,
}

impl WireChecklist {
  fn into_record(mut self) -> ChecklistRecord {
    self.items.sort_by_key(|i| (i.order, i.id));
    ChecklistRecord {
      id: ChecklistId(self.id),
      name: self.name,
      items: self.items.into_iter().map(WireChecklistItem::into_item).collect(),
    }
  }
}

/// The checklist item reference on an item result.
#[derive(Debug, Deserialize)]
struct WireResultItem {
  id: i64,
  #[serde(default)]
  check_item: Option<Related<WireCheckItem>>,
}

#[derive(Debug, Deserialize)]
struct WireItemResult {
  id: i64,
  checklist_item: Related<WireResultItem>,
  status: String,
  #[serde(default)]
  value: String,
  #[serde(default)]
  note: String,
}

impl WireItemResult {
  fn into_record(self) -> Result<ItemResultRecord, StoreError> {
    let (checklist_item_id, title) = match self.checklist_item {
      Related::Id(id) => (id, None),
      Related::Object(item) => {
        let title = match item.check_item {
          Some(Related::Object(master)) => non_empty(&master.name),
          _ => None,
        };
        (item.id, title)
      }
    };

    Ok(ItemResultRecord {
      id: ItemResultId(self.id),
      checklist_item_id: ChecklistItemId(checklist_item_id),
      status: self
        .status
        .parse::<ItemStatus>()
        .map_err(invalid("status"))?,
      value: self.value,
      note: self.note,
      title,
    })
  }
}

#[derive(Debug, Deserialize)]
struct WireExecution {
  id: i64,
  #[serde(default)]
  process_sheet: Option<Related<WireId>>,
  checklist: Related<WireId>,
  status: String,
  #[serde(default)]
  result: Option<String>,
  #[serde(default)]
  executor: Option<serde_json::Value>,
  #[serde(default)]
  started_at: Option<DateTime<Utc>>,
  #[serde(default)]
  finished_at: Option<DateTime<Utc>>,
  #[serde(default)]
  created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  item_results: Vec<WireItemResult>,
}

impl WireExecution {
  fn into_record(self) -> Result<SessionRecord, StoreError> {
    let result = match self.result.as_deref() {
      None | Some("") => None,
      Some(raw) => Some(raw.parse::<Verdict>().map_err(invalid("result"))?),
    };
    // The executor is either a username or a nested user object.
    let executor = match self.executor {
      Some(serde_json::Value::String(name)) => Some(name),
      Some(serde_json::Value::Object(user)) => user
        .get("username")
        .and_then(|u| u.as_str())
        .map(str::to_string),
      _ => None,
    };

    Ok(SessionRecord {
      id: SessionId(self.id),
      process_id: self.process_sheet.map(|p| ProcessId(p.id())),
      checklist_id: ChecklistId(self.checklist.id()),
      status: self
        .status
        .parse::<ExecutionStatus>()
        .map_err(invalid("status"))?,
      result,
      executor,
      started_at: self.started_at,
      finished_at: self.finished_at,
      created_at: self.created_at,
    })
  }
}

/// A list endpoint answer, paginated or not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireList<T> {
  Page {
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
  },
  Bare(Vec<T>),
}

impl<T> WireList<T> {
  fn into_parts(self) -> (Vec<T>, Option<String>) {
    match self {
      WireList::Page { results, next } => (results, next),
      WireList::Bare(results) => (results, None),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::ItemWrite;

  #[test]
  fn test_base_url_gets_trailing_slash() {
    let store = HttpRecordStore::new("http://localhost:8000/api", Duration::from_secs(1)).unwrap();
    assert_eq!(store.base_url().as_str(), "http://localhost:8000/api/");
    assert_eq!(
      store.url("executions/3/").unwrap().as_str(),
      "http://localhost:8000/api/executions/3/"
    );
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    let result = HttpRecordStore::new("not a url", Duration::from_secs(1));
    assert!(matches!(result, Err(StoreError::Url(_))));
  }

  #[test]
  fn test_process_checklist_binding_variants() {
    let bare: WireProcess =
      serde_json::from_value(json!({"id": 1, "name": "p", "checklist": 4})).unwrap();
    assert_eq!(bare.into_record().checklist_id, Some(ChecklistId(4)));

    let nested: WireProcess =
      serde_json::from_value(json!({"id": 1, "name": "p", "checklist": {"id": 9, "name": "c"}}))
        .unwrap();
    assert_eq!(nested.into_record().checklist_id, Some(ChecklistId(9)));

    let unbound: WireProcess =
      serde_json::from_value(json!({"id": 1, "name": "p", "checklist": null})).unwrap();
    assert_eq!(unbound.into_record().checklist_id, None);
  }

  #[test]
  fn test_checklist_items_are_ordered_and_fall_back_to_master_data() {
    let wire: WireChecklist = serde_json::from_value(json!({
      "id": 2,
      "name": "Initial lot",
      "items": [
        {
          "id": 11, "order": 1, "instruction": "", "unit": "",
          "check_item": {"id": 100, "name": "Width", "type": "number", "unit": "mm", "description": "Measure the width"}
        },
        {
          "id": 10, "order": 0, "instruction": "Look at the surface", "unit": "",
          "check_item": {"id": 101, "name": "", "type": "select"}
        },
        {"id": 12, "order": 2, "check_item": 102}
      ]
    }))
    .unwrap();
    let record = wire.into_record();

    let ids: Vec<i64> = record.items.iter().map(|i| i.id.get()).collect();
    assert_eq!(ids, vec![10, 11, 12]);

    assert_eq!(record.items[0].title, "Item 10");
    assert_eq!(record.items[0].kind, ItemKind::Enumerated);
    assert_eq!(record.items[0].instruction, "Look at the surface");

    assert_eq!(record.items[1].title, "Width");
    assert_eq!(record.items[1].instruction, "Measure the width");
    assert_eq!(record.items[1].unit.as_deref(), Some("mm"));
    assert_eq!(record.items[1].kind, ItemKind::Numeric);

    assert_eq!(record.items[2].kind, ItemKind::FreeText);
  }

  #[test]
  fn test_execution_decoding() {
    let wire: WireExecution = serde_json::from_value(json!({
      "id": 7,
      "process_sheet": {"id": 3},
      "checklist": {"id": 2, "name": "c"},
      "status": "completed",
      "result": "",
      "executor": {"id": 1, "username": "sato"},
      "started_at": "2024-03-10T09:00:00Z",
      "finished_at": null,
      "created_at": "2024-03-10T09:00:00Z",
      "item_results": [
        {"id": 70, "checklist_item": {"id": 10, "check_item": {"id": 100, "name": "Width"}}, "status": "OK", "value": "10.5", "note": ""},
        {"id": 71, "checklist_item": 11, "status": "SKIP", "value": "", "note": "n/a"}
      ]
    }))
    .unwrap();

    let results: Vec<ItemResultRecord> = wire
      .item_results
      .into_iter()
      .map(|r| WireItemResult::into_record(r).unwrap())
      .collect();
    assert_eq!(results[0].title.as_deref(), Some("Width"));
    assert_eq!(results[1].checklist_item_id, ChecklistItemId(11));
    assert_eq!(results[1].status, ItemStatus::Skip);
    assert_eq!(results[1].note, "n/a");
  }

  #[test]
  fn test_execution_record_fields() {
    let wire: WireExecution = serde_json::from_value(json!({
      "id": 7,
      "process_sheet": 3,
      "checklist": 2,
      "status": "running",
      "result": "warn",
      "executor": "sato"
    }))
    .unwrap();
    let record = wire.into_record().unwrap();
    assert_eq!(record.process_id, Some(ProcessId(3)));
    assert_eq!(record.result, Some(Verdict::Warn));
    assert_eq!(record.executor.as_deref(), Some("sato"));
    assert_eq!(record.status, ExecutionStatus::Running);
  }

  #[test]
  fn test_unknown_status_is_invalid() {
    let wire: WireExecution = serde_json::from_value(json!({
      "id": 7, "checklist": 2, "status": "paused"
    }))
    .unwrap();
    assert!(matches!(
      wire.into_record(),
      Err(StoreError::InvalidRecord { .. })
    ));
  }

  #[test]
  fn test_list_envelopes() {
    let bare: WireList<WireId> = serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
    let (items, next) = bare.into_parts();
    assert_eq!(items.len(), 2);
    assert!(next.is_none());

    let page: WireList<WireId> = serde_json::from_value(json!({
      "count": 3, "next": "http://host/api/x/?page=2", "previous": null, "results": [{"id": 1}]
    }))
    .unwrap();
    let (items, next) = page.into_parts();
    assert_eq!(items.len(), 1);
    assert_eq!(next.as_deref(), Some("http://host/api/x/?page=2"));
  }

  #[test]
  fn test_create_body() {
    let started_at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
    let body = create_body(&NewSession {
      process_id: ProcessId(3),
      checklist_id: ChecklistId(2),
      started_at,
    });
    assert_eq!(
      body,
      json!({
        "process_sheet_id": 3,
        "checklist_id": 2,
        "status": "running",
        "result": "",
        "started_at": "2024-03-10T09:00:00Z",
      })
    );
  }

  #[test]
  fn test_write_body_nests_item_results() {
    let body = write_body(&ItemResultsWrite {
      status: ExecutionStatus::Completed,
      finished_at: Utc.with_ymd_and_hms(2024, 3, 10, 9, 12, 0).unwrap(),
      items: vec![
        ItemWrite {
          checklist_item_id: ChecklistItemId(10),
          value: "10.5".to_string(),
          note: String::new(),
          status: ItemStatus::Ok,
        },
        ItemWrite {
          checklist_item_id: ChecklistItemId(11),
          value: "fail".to_string(),
          note: "scratch".to_string(),
          status: ItemStatus::Ng,
        },
        ItemWrite {
          checklist_item_id: ChecklistItemId(12),
          value: String::new(),
          note: String::new(),
          status: ItemStatus::Skip,
        },
      ],
    });

    assert_eq!(body["status"], "completed");
    assert_eq!(body["finished_at"], "2024-03-10T09:12:00Z");
    assert_eq!(
      body["item_results_write"],
      json!([
        {"checklist_item_id": 10, "value": "10.5", "note": "", "status": "OK"},
        {"checklist_item_id": 11, "value": "fail", "note": "scratch", "status": "NG"},
        {"checklist_item_id": 12, "value": "", "note": "", "status": "SKIP"},
      ])
    );
  }

  #[test]
  fn test_photo_file_names() {
    assert_eq!(photo_file_name("image/png"), "photo.png");
    assert_eq!(photo_file_name("image/jpeg"), "photo.jpg");
    assert_eq!(photo_file_name("application/octet-stream"), "photo.bin");
  }
}
