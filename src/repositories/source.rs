//! C3 — Source repository.

use crate::error::TamsError;
use crate::metadata_store::{MetadataStore, Predicate};
use crate::models::{ContentFormat, Source, SourceCollection};
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const TABLE: &str = "sources";

pub const CREATE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id UUID,
    format String,
    label Nullable(String),
    description Nullable(String),
    tags String,
    source_collection Nullable(String),
    created_at DateTime64(6),
    updated_at DateTime64(6)
) ENGINE = MergeTree ORDER BY id
"#;

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct SourceRow {
    id: Uuid,
    format: String,
    label: Option<String>,
    description: Option<String>,
    tags: String,
    source_collection: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn to_row(source: &Source) -> Result<SourceRow, TamsError> {
    Ok(SourceRow {
        id: source.id,
        format: source.format.as_urn().to_string(),
        label: source.label.clone(),
        description: source.description.clone(),
        tags: serde_json::to_string(&source.tags)?,
        source_collection: source
            .source_collection
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        created_at: source.created_at.timestamp_micros(),
        updated_at: source.updated_at.timestamp_micros(),
    })
}

fn from_row(row: SourceRow) -> Result<Source, TamsError> {
    let format = ContentFormat::from_urn(&row.format)
        .ok_or_else(|| TamsError::Internal(format!("unknown source format in row: {}", row.format)))?;
    Ok(Source {
        id: row.id,
        format,
        label: row.label,
        description: row.description,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        source_collection: row
            .source_collection
            .as_deref()
            .and_then(|s| serde_json::from_str::<SourceCollection>(s).ok()),
        created_at: micros_to_datetime(row.created_at),
        updated_at: micros_to_datetime(row.updated_at),
    })
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Default)]
pub struct SourceListFilters {
    pub label: Option<String>,
    pub format: Option<ContentFormat>,
}

pub struct SourceRepo {
    store: Arc<MetadataStore>,
}

impl SourceRepo {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, source: &Source) -> Result<(), TamsError> {
        let row = to_row(source)?;
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

    pub async fn get(&self, id: Uuid) -> Result<Source, TamsError> {
        let predicate = Predicate::new().eq_uuid("id", id);
        let sql = format!("SELECT ?fields FROM {TABLE} WHERE {} LIMIT 1", predicate.to_where_clause());
        let row = self
            .store
            .client()
            .query(&sql)
            .fetch_optional::<SourceRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("get source '{id}' failed: {e}")))?
            .ok_or_else(|| TamsError::SourceNotFound { source_id: id.to_string() })?;
        from_row(row)
    }

    pub async fn try_get_opt(&self, id: Uuid) -> Result<Option<Source>, TamsError> {
        match self.get(id).await {
            Ok(source) => Ok(Some(source)),
            Err(TamsError::SourceNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list(&self, filters: SourceListFilters, limit: u32) -> Result<Vec<Source>, TamsError> {
        let mut predicate = Predicate::new();
        if let Some(label) = &filters.label {
            predicate = predicate.eq("label", label);
        }
        if let Some(format) = &filters.format {
            predicate = predicate.eq("format", format.as_urn());
        }
        let sql = format!(
            "SELECT ?fields FROM {TABLE} WHERE {} ORDER BY created_at LIMIT {limit}",
            predicate.to_where_clause()
        );
        let rows = self
            .store
            .client()
            .query(&sql)
            .fetch_all::<SourceRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list sources failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    /// Emulated as delete-then-insert; the metadata store has no native row
    /// UPDATE (§9 Open Question).
    pub async fn update(&self, source: &Source) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq_uuid("id", source.id);
        self.store.delete(TABLE, &predicate).await?;
        self.create(source).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq_uuid("id", id);
        self.store.delete(TABLE, &predicate).await
    }

    pub async fn set_tags(&self, id: Uuid, tags: HashMap<String, String>) -> Result<Source, TamsError> {
        let mut source = self.get(id).await?;
        source.tags = tags;
        source.updated_at = Utc::now();
        self.update(&source).await?;
        Ok(source)
    }

    pub async fn set_label(&self, id: Uuid, label: Option<String>) -> Result<Source, TamsError> {
        let mut source = self.get(id).await?;
        source.label = label;
        source.updated_at = Utc::now();
        self.update(&source).await?;
        Ok(source)
    }

    pub async fn set_description(&self, id: Uuid, description: Option<String>) -> Result<Source, TamsError> {
        let mut source = self.get(id).await?;
        source.description = description;
        source.updated_at = Utc::now();
        self.update(&source).await?;
        Ok(source)
    }
}
