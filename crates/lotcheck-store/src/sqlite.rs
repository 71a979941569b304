use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use lotcheck_checklist::{
  ChecklistId, ChecklistItemId, ChecklistItemRef, ExecutionStatus, ItemKind, ItemResultId,
  ProcessId, SessionId, Verdict,
};

use crate::types::{fallback_item_title, non_empty};
use crate::{
  ChecklistRecord, ItemResultRecord, ItemResultsWrite, NewSession, PhotoUpload, ProcessRecord,
  RecordStore, SessionRecord, StoreError,
};

/// SQLite-based record store.
pub struct SqliteRecordStore {
  pool: SqlitePool,
}

impl SqliteRecordStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `url` and run migrations.
  pub async fn connect(url: &str) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A migrated store backed by a private in-memory database.
  pub async fn in_memory() -> Result<Self, StoreError> {
    // A single long-lived connection keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  /// Insert or replace a checklist and its items.
  ///
  /// Item positions follow the order of `checklist.items`.
  pub async fn insert_checklist(&self, checklist: &ChecklistRecord) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
            INSERT INTO checklists (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
    )
    .bind(checklist.id.get())
    .bind(&checklist.name)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM checklist_items WHERE checklist_id = ?")
      .bind(checklist.id.get())
      .execute(&mut *tx)
      .await?;

    for (position, item) in checklist.items.iter().enumerate() {
      sqlx::query(
        r#"
            INSERT INTO checklist_items (id, checklist_id, position, title, instruction, kind, unit, reference_image)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
      )
      .bind(item.id.get())
      .bind(checklist.id.get())
      .bind(position as i64)
      .bind(&item.title)
      .bind(&item.instruction)
      .bind(item.kind.master_type())
      .bind(&item.unit)
      .bind(&item.reference_image)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    debug!(checklist_id = %checklist.id, items = checklist.items.len(), "checklist_stored");
    Ok(())
  }

  /// Insert or replace a process sheet.
  pub async fn insert_process(&self, process: &ProcessRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO process_sheets (id, name, lot_number, assignee, checklist_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
              name = excluded.name,
              lot_number = excluded.lot_number,
              assignee = excluded.assignee,
              checklist_id = excluded.checklist_id
            "#,
    )
    .bind(process.id.get())
    .bind(&process.name)
    .bind(&process.lot_number)
    .bind(&process.assignee)
    .bind(process.checklist_id.map(ChecklistId::get))
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  /// Number of photos attached to the item results of a session.
  pub async fn photo_count(&self, session_id: SessionId) -> Result<i64, StoreError> {
    let row = sqlx::query(
      r#"
            SELECT COUNT(*) AS photos
            FROM execution_photos p
            JOIN execution_item_results r ON r.id = p.item_result_id
            WHERE r.execution_id = ?
            "#,
    )
    .bind(session_id.get())
    .fetch_one(&self.pool)
    .await?;

    Ok(row.try_get("photos")?)
  }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
  async fn get_process(&self, process_id: ProcessId) -> Result<ProcessRecord, StoreError> {
    let row = sqlx::query(
      r#"
            SELECT id, name, lot_number, assignee, checklist_id
            FROM process_sheets
            WHERE id = ?
            "#,
    )
    .bind(process_id.get())
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("process sheet {}", process_id)))?;

    Ok(ProcessRecord {
      id: ProcessId(row.try_get("id")?),
      name: row.try_get("name")?,
      lot_number: row.try_get("lot_number")?,
      assignee: row.try_get("assignee")?,
      checklist_id: row
        .try_get::<Option<i64>, _>("checklist_id")?
        .map(ChecklistId),
    })
  }

  async fn get_checklist(&self, checklist_id: ChecklistId) -> Result<ChecklistRecord, StoreError> {
    let row = sqlx::query("SELECT id, name FROM checklists WHERE id = ?")
      .bind(checklist_id.get())
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| StoreError::NotFound(format!("checklist {}", checklist_id)))?;

    let item_rows = sqlx::query(
      r#"
            SELECT id, title, instruction, kind, unit, reference_image
            FROM checklist_items
            WHERE checklist_id = ?
            ORDER BY position ASC, id ASC
            "#,
    )
    .bind(checklist_id.get())
    .fetch_all(&self.pool)
    .await?;

    let items = item_rows
      .iter()
      .map(item_from_row)
      .collect::<Result<Vec<_>, _>>()?;

    Ok(ChecklistRecord {
      id: ChecklistId(row.try_get("id")?),
      name: row.try_get("name")?,
      items,
    })
  }

  async fn create_session(&self, session: &NewSession) -> Result<SessionRecord, StoreError> {
    let done = sqlx::query(
      r#"
            INSERT INTO executions (process_sheet_id, checklist_id, status, result, started_at, created_at)
            VALUES (?, ?, ?, '', ?, ?)
            "#,
    )
    .bind(session.process_id.get())
    .bind(session.checklist_id.get())
    .bind(ExecutionStatus::Running.as_str())
    .bind(session.started_at)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    let session_id = SessionId(done.last_insert_rowid());
    debug!(session_id = %session_id, process_id = %session.process_id, "session_row_created");
    self.get_session(session_id).await
  }

  async fn write_item_results(
    &self,
    session_id: SessionId,
    write: &ItemResultsWrite,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    let mut tx = self.pool.begin().await?;

    let row = sqlx::query("SELECT status FROM executions WHERE id = ?")
      .bind(session_id.get())
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;
    let current: ExecutionStatus = parse_field(&row.try_get::<String, _>("status")?)?;
    if !current.can_advance_to(write.status) {
      return Err(StoreError::StatusRegression {
        from: current,
        to: write.status,
      });
    }

    // Results are replaced wholesale, photos of the old results go with them.
    sqlx::query(
      r#"
            DELETE FROM execution_photos
            WHERE item_result_id IN (SELECT id FROM execution_item_results WHERE execution_id = ?)
            "#,
    )
    .bind(session_id.get())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM execution_item_results WHERE execution_id = ?")
      .bind(session_id.get())
      .execute(&mut *tx)
      .await?;

    for item in &write.items {
      sqlx::query(
        r#"
            INSERT INTO execution_item_results (execution_id, checklist_item_id, status, value, note)
            VALUES (?, ?, ?, ?, ?)
            "#,
      )
      .bind(session_id.get())
      .bind(item.checklist_item_id.get())
      .bind(item.status.as_str())
      .bind(&item.value)
      .bind(&item.note)
      .execute(&mut *tx)
      .await?;
    }

    sqlx::query("UPDATE executions SET status = ?, finished_at = ? WHERE id = ?")
      .bind(write.status.as_str())
      .bind(write.finished_at)
      .bind(session_id.get())
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    debug!(session_id = %session_id, items = write.items.len(), "item_results_replaced");

    self.list_item_results(session_id).await
  }

  async fn upload_photo(&self, upload: &PhotoUpload<'_>) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO execution_photos (item_result_id, image, mime_type, annotation, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(upload.item_result_id.get())
    .bind(upload.image)
    .bind(upload.mime_type)
    .bind(upload.annotation)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StoreError> {
    let row = sqlx::query(
      r#"
            SELECT id, process_sheet_id, checklist_id, status, result, executor, started_at, finished_at, created_at
            FROM executions
            WHERE id = ?
            "#,
    )
    .bind(session_id.get())
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;

    session_from_row(&row)
  }

  async fn list_item_results(
    &self,
    session_id: SessionId,
  ) -> Result<Vec<ItemResultRecord>, StoreError> {
    let rows = sqlx::query(
      r#"
            SELECT r.id, r.checklist_item_id, r.status, r.value, r.note, ci.title
            FROM execution_item_results r
            LEFT JOIN checklist_items ci ON ci.id = r.checklist_item_id
            WHERE r.execution_id = ?
            ORDER BY COALESCE(ci.position, 0) ASC, r.checklist_item_id ASC, r.id ASC
            "#,
    )
    .bind(session_id.get())
    .fetch_all(&self.pool)
    .await?;

    rows.iter().map(item_result_from_row).collect()
  }

  async fn finalize_session(
    &self,
    session_id: SessionId,
    verdict: Verdict,
  ) -> Result<(), StoreError> {
    let done = sqlx::query("UPDATE executions SET result = ? WHERE id = ?")
      .bind(verdict.as_str())
      .bind(session_id.get())
      .execute(&self.pool)
      .await?;

    if done.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("session {}", session_id)));
    }
    Ok(())
  }
}

fn parse_field<T>(raw: &str) -> Result<T, StoreError>
where
  T: FromStr<Err = String>,
{
  raw
    .parse()
    .map_err(|message| StoreError::InvalidRecord { message })
}

fn item_from_row(row: &SqliteRow) -> Result<ChecklistItemRef, StoreError> {
  let id = ChecklistItemId(row.try_get("id")?);
  let title: String = row.try_get("title")?;
  let kind: String = row.try_get("kind")?;
  let unit: Option<String> = row.try_get("unit")?;
  let reference_image: Option<String> = row.try_get("reference_image")?;

  Ok(ChecklistItemRef {
    id,
    title: non_empty(&title).unwrap_or_else(|| fallback_item_title(id)),
    instruction: row.try_get("instruction")?,
    kind: ItemKind::from_master_type(&kind),
    unit: unit.as_deref().and_then(non_empty),
    reference_image: reference_image.as_deref().and_then(non_empty),
  })
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord, StoreError> {
  let status: String = row.try_get("status")?;
  let result: String = row.try_get("result")?;

  Ok(SessionRecord {
    id: SessionId(row.try_get("id")?),
    process_id: row
      .try_get::<Option<i64>, _>("process_sheet_id")?
      .map(ProcessId),
    checklist_id: ChecklistId(row.try_get("checklist_id")?),
    status: parse_field(&status)?,
    result: if result.is_empty() {
      None
    } else {
      Some(parse_field(&result)?)
    },
    executor: row.try_get("executor")?,
    started_at: row.try_get("started_at")?,
    finished_at: row.try_get("finished_at")?,
    created_at: row.try_get("created_at")?,
  })
}

fn item_result_from_row(row: &SqliteRow) -> Result<ItemResultRecord, StoreError> {
  let status: String = row.try_get("status")?;
  let title: Option<String> = row.try_get("title")?;

  Ok(ItemResultRecord {
    id: ItemResultId(row.try_get("id")?),
    checklist_item_id: ChecklistItemId(row.try_get("checklist_item_id")?),
    status: parse_field(&status)?,
    value: row.try_get("value")?,
    note: row.try_get("note")?,
    title: title.as_deref().and_then(non_empty),
  })
}
