//! C3 — Object repository. `referenced_by_flows` is never stored on the
//! `objects` row itself; it is derived by a GROUP BY over the
//! `flow_object_references` join table (spec.md §3, §9: "materialize
//! `referenced_by_flows` by a GROUP BY on the join table. This avoids
//! cycles of ownership").

use crate::error::TamsError;
use crate::metadata_store::{MetadataStore, Predicate};
use crate::models::Object;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const TABLE: &str = "objects";
pub const REFERENCES_TABLE: &str = "flow_object_references";

pub const CREATE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    object_id String,
    size_bytes Nullable(UInt64),
    content_type Nullable(String),
    created_at DateTime64(6)
) ENGINE = MergeTree ORDER BY object_id
"#;

pub const CREATE_REFERENCES_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS flow_object_references (
    object_id String,
    flow_id UUID,
    created_at DateTime64(6)
) ENGINE = MergeTree ORDER BY (object_id, flow_id)
"#;

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct ObjectRow {
    object_id: String,
    size_bytes: Option<u64>,
    content_type: Option<String>,
    created_at: i64,
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct ReferenceRow {
    object_id: String,
    flow_id: Uuid,
    created_at: i64,
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn to_row(object: &Object) -> ObjectRow {
    ObjectRow {
        object_id: object.object_id.clone(),
        size_bytes: object.size_bytes,
        content_type: object.content_type.clone(),
        created_at: object.created_at.timestamp_micros(),
    }
}

pub struct ObjectRepo {
    store: Arc<MetadataStore>,
}

impl ObjectRepo {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, object: &Object) -> Result<(), TamsError> {
        let row = to_row(object);
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

    /// Fetches the object row and materializes `referenced_by_flows`/
    /// `first_referenced_by_flow` from `flow_object_references` — neither
    /// field is a stored column (spec.md §9).
    pub async fn get(&self, object_id: &str) -> Result<Object, TamsError> {
        let predicate = Predicate::new().eq("object_id", object_id);
        let sql = format!("SELECT ?fields FROM {TABLE} WHERE {} LIMIT 1", predicate.to_where_clause());
        let row = self
            .store
            .client()
            .query(&sql)
            .fetch_optional::<ObjectRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("get object '{object_id}' failed: {e}")))?
            .ok_or_else(|| TamsError::ObjectNotFound { object_id: object_id.to_string() })?;
        let references = self.list_references(object_id).await?;
        Ok(self.materialize(row, &references))
    }

    pub async fn try_get(&self, object_id: &str) -> Result<Option<Object>, TamsError> {
        match self.get(object_id).await {
            Ok(object) => Ok(Some(object)),
            Err(TamsError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn materialize(&self, row: ObjectRow, references: &[crate::models::FlowObjectReference]) -> Object {
        let mut by_created: Vec<&crate::models::FlowObjectReference> = references.iter().collect();
        by_created.sort_by_key(|r| r.created);
        Object {
            object_id: row.object_id,
            size_bytes: row.size_bytes,
            content_type: row.content_type,
            referenced_by_flows: by_created.iter().map(|r| r.flow_id).collect(),
            first_referenced_by_flow: by_created.first().map(|r| r.flow_id),
            created_at: micros_to_datetime(row.created_at),
        }
    }

    /// All `flow_object_references` rows for `object_id`, oldest first.
    async fn list_references(&self, object_id: &str) -> Result<Vec<crate::models::FlowObjectReference>, TamsError> {
        let predicate = Predicate::new().eq("object_id", object_id);
        let sql = format!(
            "SELECT ?fields FROM {REFERENCES_TABLE} WHERE {} ORDER BY created_at",
            predicate.to_where_clause()
        );
        let rows = self
            .store
            .client()
            .query(&sql)
            .fetch_all::<ReferenceRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list references for object '{object_id}' failed: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|r| crate::models::FlowObjectReference {
                object_id: r.object_id,
                flow_id: r.flow_id,
                created: micros_to_datetime(r.created_at),
            })
            .collect())
    }

    /// Object rows never change once created other than the metadata fields
    /// HEAD can update (`size_bytes`/`content_type`) — references live in
    /// their own table and are never touched by this method.
    pub async fn update(&self, object: &Object) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq("object_id", &object.object_id);
        self.store.delete(TABLE, &predicate).await?;
        self.create(object).await
    }

    /// Deletes the object row. Callers (C4's `delete_object`, I3-guarded)
    /// are responsible for confirming `flow_object_references` is already
    /// empty; this method does not re-check.
    pub async fn delete(&self, object_id: &str) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq("object_id", object_id);
        self.store.delete(TABLE, &predicate).await
    }

    /// Adds `flow_id` to the object's reference set by inserting a
    /// `flow_object_references` row, creating the object row lazily on first
    /// reference (§4.6 Phase C). Idempotent: re-registering the same
    /// `(object_id, flow_id)` pair does not insert a duplicate join row.
    pub async fn add_reference(&self, object_id: &str, flow_id: Uuid, size_bytes: Option<u64>, content_type: Option<String>) -> Result<Object, TamsError> {
        if self.try_get(object_id).await?.is_none() {
            let object = Object {
                object_id: object_id.to_string(),
                size_bytes,
                content_type,
                referenced_by_flows: Vec::new(),
                first_referenced_by_flow: None,
                created_at: Utc::now(),
            };
            self.create(&object).await?;
        }

        let references = self.list_references(object_id).await?;
        if !references.iter().any(|r| r.flow_id == flow_id) {
            let row = ReferenceRow {
                object_id: object_id.to_string(),
                flow_id,
                created_at: Utc::now().timestamp_micros(),
            };
            let mut insert = self
                .store
                .client()
                .insert(REFERENCES_TABLE)
                .map_err(|e| TamsError::StorageError(format!("insert '{REFERENCES_TABLE}' failed: {e}")))?;
            insert
                .write(&row)
                .await
                .map_err(|e| TamsError::StorageError(format!("insert '{REFERENCES_TABLE}' failed: {e}")))?;
            insert
                .end()
                .await
                .map_err(|e| TamsError::StorageError(format!("insert '{REFERENCES_TABLE}' failed: {e}")))?;
        }

        self.get(object_id).await
    }

    /// Removes `flow_id`'s `flow_object_references` row and returns the
    /// remaining reference count. The object row and its bytes are never
    /// touched here — per spec, a segment/flow delete releases the
    /// reference but leaves the Object row in place; only an explicit
    /// `Delete-object` (guarded by I3) removes the row, and even then the
    /// bytes are left for an out-of-band compactor to sweep.
    pub async fn remove_reference(&self, object_id: &str, flow_id: Uuid) -> Result<usize, TamsError> {
        self.get(object_id).await?;
        let predicate = Predicate::new().eq("object_id", object_id).eq_uuid("flow_id", flow_id);
        self.store.delete(REFERENCES_TABLE, &predicate).await?;
        Ok(self.list_references(object_id).await?.len())
    }
}
