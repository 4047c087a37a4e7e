//! C3 — Segment repository (the flow-timeline/object join table).
//!
//! Grounded on `original_source/app/storage/endpoints/segments/segments_storage.py`
//! (`SegmentsStorage`): segment rows carry an object reference and a
//! timerange but never embed a presigned URL — `get_urls` is re-synthesized
//! on every read by the C6 segment pipeline, since presigned URLs expire.

use crate::error::TamsError;
use crate::metadata_store::{MetadataStore, Predicate};
use crate::models::Segment;
use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const TABLE: &str = "segments";

pub const CREATE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS segments (
    flow_id UUID,
    object_id String,
    timerange String,
    ts_offset Nullable(String),
    last_duration Nullable(String),
    sample_offset Nullable(UInt64),
    sample_count Nullable(UInt64),
    key_frame_count Nullable(UInt32),
    created_at DateTime64(6),
    storage_path Nullable(String)
) ENGINE = MergeTree ORDER BY (flow_id, timerange)
"#;

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct SegmentRow {
    flow_id: Uuid,
    object_id: String,
    timerange: String,
    ts_offset: Option<String>,
    last_duration: Option<String>,
    sample_offset: Option<u64>,
    sample_count: Option<u64>,
    key_frame_count: Option<u32>,
    created_at: i64,
    storage_path: Option<String>,
}

fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn to_row(segment: &Segment) -> SegmentRow {
    SegmentRow {
        flow_id: segment.flow_id,
        object_id: segment.object_id.clone(),
        timerange: segment.timerange.format(),
        ts_offset: segment.ts_offset.clone(),
        last_duration: segment.last_duration.clone(),
        sample_offset: segment.sample_offset,
        sample_count: segment.sample_count,
        key_frame_count: segment.key_frame_count,
        created_at: segment.created_at.timestamp_micros(),
        storage_path: segment.storage_path.clone(),
    }
}

fn from_row(row: SegmentRow) -> Result<Segment, TamsError> {
    Ok(Segment {
        flow_id: row.flow_id,
        object_id: row.object_id,
        timerange: TimeRange::parse(&row.timerange)?,
        ts_offset: row.ts_offset,
        last_duration: row.last_duration,
        sample_offset: row.sample_offset,
        sample_count: row.sample_count,
        key_frame_count: row.key_frame_count,
        get_urls: Vec::new(),
        created_at: micros_to_datetime(row.created_at),
        storage_path: row.storage_path,
    })
}

pub struct SegmentRepo {
    store: Arc<MetadataStore>,
}

impl SegmentRepo {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, segment: &Segment) -> Result<(), TamsError> {
        let row = to_row(segment);
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

    /// All segments for a flow, filtered (server-side via `ALTER TABLE`-free
    /// scan) to those overlapping `range` when one is given.
    pub async fn list_for_flow(&self, flow_id: Uuid, range: Option<TimeRange>, limit: u32) -> Result<Vec<Segment>, TamsError> {
        let predicate = Predicate::new().eq_uuid("flow_id", flow_id);
        let sql = format!(
            "SELECT ?fields FROM {TABLE} WHERE {} ORDER BY timerange LIMIT {limit}",
            predicate.to_where_clause()
        );
        let rows = self
            .store
            .client()
            .query(&sql)
            .fetch_all::<SegmentRow>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list segments for flow '{flow_id}' failed: {e}")))?;
        let segments: Vec<Segment> = rows.into_iter().map(from_row).collect::<Result<_, _>>()?;
        Ok(match range {
            Some(r) => segments.into_iter().filter(|s| s.timerange.overlaps(&r)).collect(),
            None => segments,
        })
    }

    /// Count of segments whose range overlaps `range` — used by C4 to decide
    /// whether a range-delete should be promoted to the async worker.
    pub async fn count_overlapping(&self, flow_id: Uuid, range: TimeRange) -> Result<usize, TamsError> {
        Ok(self.list_for_flow(flow_id, Some(range), u32::MAX).await?.len())
    }

    /// Deletes every segment in `flow_id` overlapping `range`. When `range`
    /// is `None`, deletes the entire flow's timeline.
    pub async fn delete_range(&self, flow_id: Uuid, range: Option<TimeRange>) -> Result<Vec<Segment>, TamsError> {
        let all = self.list_for_flow(flow_id, None, u32::MAX).await?;
        let (to_delete, kept): (Vec<Segment>, Vec<Segment>) = match range {
            Some(r) => all.into_iter().partition(|s| s.timerange.overlaps(&r)),
            None => (all, Vec::new()),
        };
        let predicate = Predicate::new().eq_uuid("flow_id", flow_id);
        self.store.delete(TABLE, &predicate).await?;
        for segment in &kept {
            self.create(segment).await?;
        }
        Ok(to_delete)
    }
}
