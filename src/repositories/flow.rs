//! C3 — Flow repository. Reconstructs the tagged `Flow` enum from a single
//! wide row whose variant-specific columns are nullable, keyed off the
//! `format` column — never via structural/`hasattr` inspection (§9 redesign
//! flag), the anti-pattern `original_source/app/storage/endpoints/flows/flows_storage.py`
//! uses when building its flow dict.

use crate::error::TamsError;
use crate::metadata_store::{MetadataStore, Predicate};
use crate::models::{Flow, FlowCollection, FlowCore};
use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const TABLE: &str = "flows";

pub const CREATE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS flows (
    id UUID,
    source_id Nullable(UUID),
    format String,
    label Nullable(String),
    description Nullable(String),
    tags String,
    read_only UInt8,
    max_bit_rate Nullable(UInt64),
    avg_bit_rate Nullable(UInt64),
    container Nullable(String),
    codec Nullable(String),
    available_timerange Nullable(String),
    frame_width Nullable(UInt32),
    frame_height Nullable(UInt32),
    frame_rate Nullable(String),
    sample_rate Nullable(UInt32),
    channels Nullable(UInt32),
    flow_collection Nullable(String),
    created_at DateTime64(6),
    updated_at DateTime64(6)
) ENGINE = MergeTree ORDER BY id
"#;

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct FlowRow {
    id: Uuid,
    source_id: Option<Uuid>,
    format: String,
    label: Option<String>,
    description: Option<String>,
    tags: String,
    read_only: u8,
    max_bit_rate: Option<u64>,
    avg_bit_rate: Option<u64>,
    container: Option<String>,
    codec: Option<String>,
    available_timerange: Option<String>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    frame_rate: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u32>,
    flow_collection: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn to_row(flow: &Flow) -> Result<FlowRow, TamsError> {
    let core = flow.core();
    let mut row = FlowRow {
        id: core.id,
        source_id: core.source_id,
        format: flow.format().as_urn().to_string(),
        label: core.label.clone(),
        description: core.description.clone(),
        tags: serde_json::to_string(&core.tags)?,
        read_only: core.read_only as u8,
        max_bit_rate: core.max_bit_rate,
        avg_bit_rate: core.avg_bit_rate,
        container: core.container.clone(),
        codec: core.codec.clone(),
        available_timerange: core.available_timerange.as_ref().map(|t| t.format()),
        frame_width: None,
        frame_height: None,
        frame_rate: None,
        sample_rate: None,
        channels: None,
        flow_collection: None,
        created_at: core.created_at.timestamp_micros(),
        updated_at: core.updated_at.timestamp_micros(),
    };
    match flow {
        Flow::Video { frame_width, frame_height, frame_rate, .. } => {
            row.frame_width = *frame_width;
            row.frame_height = *frame_height;
            row.frame_rate = frame_rate.clone();
        }
        Flow::Image { frame_width, frame_height, .. } => {
            row.frame_width = *frame_width;
            row.frame_height = *frame_height;
        }
        Flow::Audio { sample_rate, channels, .. } => {
            row.sample_rate = *sample_rate;
            row.channels = *channels;
        }
        Flow::Data { .. } => {}
        Flow::Multi { flow_collection, .. } => {
            row.flow_collection = Some(serde_json::to_string(flow_collection)?);
        }
    }
    Ok(row)
}

fn from_row(row: FlowRow) -> Result<Flow, TamsError> {
    let core = FlowCore {
        id: row.id,
        source_id: row.source_id,
        label: row.label,
        description: row.description,
        tags: serde_json::from_str(&row.tags).unwrap_or_default(),
        read_only: row.read_only != 0,
        max_bit_rate: row.max_bit_rate,
        avg_bit_rate: row.avg_bit_rate,
        container: row.container,
        codec: row.codec,
        available_timerange: row
            .available_timerange
            .as_deref()
            .map(TimeRange::parse)
            .transpose()?,
        created_at: micros_to_datetime(row.created_at),
        updated_at: micros_to_datetime(row.updated_at),
    };

    Ok(match row.format.as_str() {
        "urn:x-nmos:format:video" => Flow::Video {
            core,
            frame_width: row.frame_width,
            frame_height: row.frame_height,
            frame_rate: row.frame_rate,
        },
        "urn:x-nmos:format:audio" => Flow::Audio {
            core,
            sample_rate: row.sample_rate,
            channels: row.channels,
        },
        "urn:x-nmos:format:data" => Flow::Data { core },
        "urn:x-tam:format:image" => Flow::Image {
            core,
            frame_width: row.frame_width,
            frame_height: row.frame_height,
        },
        "urn:x-nmos:format:multi" => Flow::Multi {
            core,
            flow_collection: row
                .flow_collection
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
        },
        other => return Err(TamsError::Internal(format!("unknown flow format in row: {other}"))),
    })
}

#[derive(Debug, Clone, Default)]
pub struct FlowListFilters {
    pub source_id: Option<Uuid>,
    pub format: Option<crate::models::ContentFormat>,
    pub codec: Option<String>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
}

pub struct FlowRepo {
    store: Arc<MetadataStore>,
}

impl FlowRepo {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, flow: &Flow) -> Result<(), TamsError> {
        let row = to_row(flow)?;
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

    pub async fn get(&self, id: Uuid) -> Result<Flow, TamsError> {
        let predicate = Predicate::new().eq_uuid("id", id);
        let sql = format!("SELECT ?fields FROM {TABLE} WHERE {} LIMIT 1", predicate.to_where_clause());
        let row = self
            .store
            .client()
            .query(&sql)
            .fetch_optional::<FlowRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("get flow '{id}' failed: {e}")))?
            .ok_or_else(|| TamsError::FlowNotFound { flow_id: id.to_string() })?;
        from_row(row)
    }

    pub async fn list(&self, filters: FlowListFilters, limit: u32) -> Result<Vec<Flow>, TamsError> {
        let mut predicate = Predicate::new();
        if let Some(sid) = filters.source_id {
            predicate = predicate.eq_uuid("source_id", sid);
        }
        if let Some(format) = &filters.format {
            predicate = predicate.eq("format", format.as_urn());
        }
        if let Some(codec) = &filters.codec {
            predicate = predicate.eq("codec", codec);
        }
        if let Some(w) = filters.frame_width {
            predicate = predicate.eq_num("frame_width", w);
        }
        if let Some(h) = filters.frame_height {
            predicate = predicate.eq_num("frame_height", h);
        }
        let sql = format!(
            "SELECT ?fields FROM {TABLE} WHERE {} ORDER BY created_at LIMIT {limit}",
            predicate.to_where_clause()
        );
        let rows = self
            .store
            .client()
            .query(&sql)
            .fetch_all::<FlowRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list flows failed: {e}")))?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn update(&self, flow: &Flow) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq_uuid("id", flow.id());
        self.store.delete(TABLE, &predicate).await?;
        self.create(flow).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), TamsError> {
        let predicate = Predicate::new().eq_uuid("id", id);
        self.store.delete(TABLE, &predicate).await
    }

    pub async fn set_tags(&self, id: Uuid, tags: HashMap<String, String>) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().tags = tags;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_read_only(&self, id: Uuid, read_only: bool) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().read_only = read_only;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_label(&self, id: Uuid, label: Option<String>) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().label = label;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_description(&self, id: Uuid, description: Option<String>) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().description = description;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_max_bit_rate(&self, id: Uuid, value: Option<u64>) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().max_bit_rate = value;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_avg_bit_rate(&self, id: Uuid, value: Option<u64>) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        flow.core_mut().avg_bit_rate = value;
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    pub async fn set_flow_collection(&self, id: Uuid, collection: FlowCollection) -> Result<Flow, TamsError> {
        let mut flow = self.get(id).await?;
        match &mut flow {
            Flow::Multi { flow_collection, .. } => *flow_collection = collection,
            _ => {
                return Err(TamsError::BadRequest(format!(
                    "flow '{id}' is not a multi-essence flow and has no flow_collection"
                )))
            }
        }
        flow.core_mut().updated_at = Utc::now();
        self.update(&flow).await?;
        Ok(flow)
    }

    /// Extends `available_timerange` to cover a newly registered segment's
    /// range, widening rather than overwriting.
    pub async fn extend_available_timerange(&self, id: Uuid, segment_range: TimeRange) -> Result<(), TamsError> {
        let mut flow = self.get(id).await?;
        let core = flow.core_mut();
        core.available_timerange = Some(match core.available_timerange {
            Some(existing) => TimeRange {
                lo: existing.lo.min(segment_range.lo),
                lo_inclusive: if segment_range.lo < existing.lo {
                    segment_range.lo_inclusive
                } else {
                    existing.lo_inclusive
                },
                hi: existing.hi.max(segment_range.hi),
                hi_inclusive: if segment_range.hi > existing.hi {
                    segment_range.hi_inclusive
                } else {
                    existing.hi_inclusive
                },
            },
            None => segment_range,
        });
        core.updated_at = Utc::now();
        self.update(&flow).await
    }
}
