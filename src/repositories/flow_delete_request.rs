//! C3 — FlowDeleteRequest repository, backing C7's async deletion worker.

use crate::error::TamsError;
use crate::metadata_store::{MetadataStore, Predicate};
use crate::models::{DeletionStatus, FlowDeleteRequest};
use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const TABLE: &str = "flow_delete_requests";

pub const CREATE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS flow_delete_requests (
    id UUID,
    flow_id UUID,
    timerange Nullable(String),
    status String,
    error Nullable(String),
    created_at DateTime64(6),
    updated_at DateTime64(6)
) ENGINE = MergeTree ORDER BY (status, created_at)
"#;

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct FlowDeleteRequestRow {
    id: Uuid,
    flow_id: Uuid,
    timerange: Option<String>,
    status: String,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn status_str(status: DeletionStatus) -> &'static str {
    match status {
        DeletionStatus::Pending => "pending",
        DeletionStatus::InProgress => "in_progress",
        DeletionStatus::Completed => "completed",
        DeletionStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> Result<DeletionStatus, TamsError> {
    match s {
        "pending" => Ok(DeletionStatus::Pending),
        "in_progress" => Ok(DeletionStatus::InProgress),
        "completed" => Ok(DeletionStatus::Completed),
        "failed" => Ok(DeletionStatus::Failed),
        other => Err(TamsError::Internal(format!("unknown deletion status in row: {other}"))),
    }
}

fn to_row(req: &FlowDeleteRequest) -> Result<FlowDeleteRequestRow, TamsError> {
    Ok(FlowDeleteRequestRow {
        id: req.id,
        flow_id: req.flow_id,
        timerange: req.timerange.as_ref().map(|t| t.format()),
        status: status_str(req.status).to_string(),
        error: req.error.clone(),
        created_at: req.created_at.timestamp_micros(),
        updated_at: req.updated_at.timestamp_micros(),
    })
}

fn from_row(row: FlowDeleteRequestRow) -> Result<FlowDeleteRequest, TamsError> {
    Ok(FlowDeleteRequest {
        id: row.id,
        flow_id: row.flow_id,
        timerange: row.timerange.as_deref().map(TimeRange::parse).transpose()?,
        status: parse_status(&row.status)?,
        error: row.error,
        created_at: micros_to_datetime(row.created_at),
        updated_at: micros_to_datetime(row.updated_at),
    })
}

pub struct FlowDeleteRequestRepo {
    store: Arc<MetadataStore>,
}

impl FlowDeleteRequestRepo {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: &FlowDeleteRequest) -> Result<(), TamsError> {
        let row = to_row(req)?;
        let mut insert = self
            .store
            .client()
            .insert(TABLE)
            .map_err(|e| TamsError::StorageError(format!("insert '{TABLE}' failed: {e}")))?;
        insert
            .write(&row)
            .await
            .map_err(|e| TamsError::StorageError(format!("insert '{TABLE}' failed: {e}")))?;
        insert
            .end()
            .await
            .map_err(|e| TamsError::StorageError(format!("insert '{TABLE}' failed: {e}")))
    }

    pub async fn get(&self, id: Uuid) -> Result<FlowDeleteRequest, TamsError> {
        let predicate = Predicate::new().eq_uuid("id", id);
        let sql = format!("SELECT ?fields FROM {TABLE} WHERE {} LIMIT 1", predicate.to_where_clause());
        let row = self
            .store
            .client()
            .query(&sql)
            .fetch_optional::<FlowDeleteRequestRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("get delete request '{id}' failed: {e}")))?
            .ok_or_else(|| TamsError::NotFound(format!("delete request '{id}' not found")))?;
        from_row(row)
    }

    pub async fn list_by_status(&self, status: DeletionStatus, limit: u32) -> Result<Vec<FlowDeleteRequest>, TamsError> {
        let predicate = Predicate::new().eq("status", status_str(status));
        let sql = format!(
            "SELECT ?fields FROM {TABLE} WHERE {} ORDER BY created_at LIMIT {limit}",
            predicate.to_where_clause()
        );
        let rows = self
            .store
            .client()
            .query(&sql)
            .fetch_all::<FlowDeleteRequestRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list delete requests failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    async fn replace(&self, req: &FlowDeleteRequest) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq_uuid("id", req.id);
        self.store.delete(TABLE, &predicate).await?;
        self.create(req).await
    }

    /// Atomically claims one `pending` request for this worker, transitioning
    /// it to `in_progress`. Returns `Ok(None)` if no pending request exists
    /// at the moment of the scan — a benign race under concurrent workers,
    /// not an error (§4.7).
    pub async fn claim_next_pending(&self) -> Result<Option<FlowDeleteRequest>, TamsError> {
        let mut pending = self.list_by_status(DeletionStatus::Pending, 1).await?;
        let Some(mut req) = pending.pop() else {
            return Ok(None);
        };
        req.status = DeletionStatus::InProgress;
        req.updated_at = Utc::now();
        self.replace(&req).await?;
        Ok(Some(req))
    }

    pub async fn mark_completed(&self, id: Uuid) -> Result<(), TamsError> {
        let mut req = self.get(id).await?;
        req.status = DeletionStatus::Completed;
        req.updated_at = Utc::now();
        self.replace(&req).await
    }

    pub async fn mark_failed(&self, id: Uuid, error: String) -> Result<(), TamsError> {
        let mut req = self.get(id).await?;
        req.status = DeletionStatus::Failed;
        req.error = Some(error);
        req.updated_at = Utc::now();
        self.replace(&req).await
    }

    /// Reverts a claimed-but-unfinished request back to `pending` on
    /// graceful shutdown, so it is picked up again after restart.
    pub async fn revert_to_pending(&self, id: Uuid) -> Result<(), TamsError> {
        let mut req = self.get(id).await?;
        req.status = DeletionStatus::Pending;
        req.updated_at = Utc::now();
        self.replace(&req).await
    }
}
