//! The TAMS data model: Source, Flow (tagged by format), Segment, Object,
//! and the join/collection types that tie them together.
//!
//! `Flow` is a tagged enum keyed on the `format` field rather than a single
//! struct with a pile of `Option<T>` fields sniffed with `hasattr`-style
//! inspection — each variant only carries the fields that make sense for it.

use crate::time_range::TimeRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    #[serde(rename = "urn:x-nmos:format:video")]
    Video,
    #[serde(rename = "urn:x-nmos:format:audio")]
    Audio,
    #[serde(rename = "urn:x-nmos:format:data")]
    Data,
    #[serde(rename = "urn:x-tam:format:image")]
    Image,
    #[serde(rename = "urn:x-nmos:format:multi")]
    Multi,
}

impl ContentFormat {
    pub fn as_urn(&self) -> &'static str {
        match self {
            ContentFormat::Video => "urn:x-nmos:format:video",
            ContentFormat::Audio => "urn:x-nmos:format:audio",
            ContentFormat::Data => "urn:x-nmos:format:data",
            ContentFormat::Image => "urn:x-tam:format:image",
            ContentFormat::Multi => "urn:x-nmos:format:multi",
        }
    }

    pub fn from_urn(urn: &str) -> Option<Self> {
        match urn {
            "urn:x-nmos:format:video" => Some(ContentFormat::Video),
            "urn:x-nmos:format:audio" => Some(ContentFormat::Audio),
            "urn:x-nmos:format:data" => Some(ContentFormat::Data),
            "urn:x-tam:format:image" => Some(ContentFormat::Image),
            "urn:x-nmos:format:multi" => Some(ContentFormat::Multi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub format: ContentFormat,
    pub label: Option<String>,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
    pub source_collection: Option<SourceCollection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(id: Uuid, format: ContentFormat) -> Self {
        let now = Utc::now();
        Self {
            id,
            format,
            label: None,
            description: None,
            tags: HashMap::new(),
            source_collection: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A group of sources presented together, e.g. multi-essence productions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCollection {
    pub sources: Vec<SourceCollectionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCollectionItem {
    pub source_id: Uuid,
    pub role: Option<String>,
}

/// Fields common to every Flow variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCore {
    pub id: Uuid,
    pub source_id: Option<Uuid>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub read_only: bool,
    pub max_bit_rate: Option<u64>,
    pub avg_bit_rate: Option<u64>,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub available_timerange: Option<TimeRange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowCore {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_id: None,
            label: None,
            description: None,
            tags: HashMap::new(),
            read_only: false,
            max_bit_rate: None,
            avg_bit_rate: None,
            container: None,
            codec: None,
            available_timerange: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum Flow {
    #[serde(rename = "urn:x-nmos:format:video")]
    Video {
        #[serde(flatten)]
        core: FlowCore,
        frame_width: Option<u32>,
        frame_height: Option<u32>,
        frame_rate: Option<String>,
    },
    #[serde(rename = "urn:x-nmos:format:audio")]
    Audio {
        #[serde(flatten)]
        core: FlowCore,
        sample_rate: Option<u32>,
        channels: Option<u32>,
    },
    #[serde(rename = "urn:x-nmos:format:data")]
    Data {
        #[serde(flatten)]
        core: FlowCore,
    },
    #[serde(rename = "urn:x-tam:format:image")]
    Image {
        #[serde(flatten)]
        core: FlowCore,
        frame_width: Option<u32>,
        frame_height: Option<u32>,
    },
    #[serde(rename = "urn:x-nmos:format:multi")]
    Multi {
        #[serde(flatten)]
        core: FlowCore,
        flow_collection: FlowCollection,
    },
}

impl Flow {
    pub fn new(id: Uuid, format: ContentFormat) -> Self {
        let core = FlowCore::new(id);
        match format {
            ContentFormat::Video => Flow::Video {
                core,
                frame_width: None,
                frame_height: None,
                frame_rate: None,
            },
            ContentFormat::Audio => Flow::Audio {
                core,
                sample_rate: None,
                channels: None,
            },
            ContentFormat::Data => Flow::Data { core },
            ContentFormat::Image => Flow::Image {
                core,
                frame_width: None,
                frame_height: None,
            },
            ContentFormat::Multi => Flow::Multi {
                core,
                flow_collection: FlowCollection::default(),
            },
        }
    }

    pub fn core(&self) -> &FlowCore {
        match self {
            Flow::Video { core, .. }
            | Flow::Audio { core, .. }
            | Flow::Data { core }
            | Flow::Image { core, .. }
            | Flow::Multi { core, .. } => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut FlowCore {
        match self {
            Flow::Video { core, .. }
            | Flow::Audio { core, .. }
            | Flow::Data { core }
            | Flow::Image { core, .. }
            | Flow::Multi { core, .. } => core,
        }
    }

    pub fn id(&self) -> Uuid {
        self.core().id
    }

    pub fn is_read_only(&self) -> bool {
        self.core().read_only
    }

    pub fn format(&self) -> ContentFormat {
        match self {
            Flow::Video { .. } => ContentFormat::Video,
            Flow::Audio { .. } => ContentFormat::Audio,
            Flow::Data { .. } => ContentFormat::Data,
            Flow::Image { .. } => ContentFormat::Image,
            Flow::Multi { .. } => ContentFormat::Multi,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowCollection {
    pub flows: Vec<FlowCollectionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCollectionItem {
    pub flow_id: Uuid,
    pub role: Option<String>,
    pub container_map: Option<ContainerMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMap {
    pub track_id: Option<String>,
    pub program_id: Option<String>,
    pub stream_id: Option<String>,
}

/// Decorates a presigned URL with the backend it was minted against (§4.6
/// read path), so clients can tell which storage backend served a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUrl {
    pub url: String,
    pub label: Option<String>,
    pub storage_id: String,
    pub presigned: bool,
    pub controlled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub flow_id: Uuid,
    pub object_id: String,
    pub timerange: TimeRange,
    pub ts_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_duration: Option<String>,
    pub sample_offset: Option<u64>,
    pub sample_count: Option<u64>,
    pub key_frame_count: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub get_urls: Vec<GetUrl>,
    pub created_at: DateTime<Utc>,
    /// Canonical object-store key, set once at registration and preserved
    /// across retrievals rather than recomputed (a client may supply its own
    /// on the allocation response; otherwise C6 derives one).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub storage_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub object_id: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub referenced_by_flows: Vec<Uuid>,
    pub first_referenced_by_flow: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The join row materializing the many-to-many between Flows and Objects
/// (spec.md §3). Inserted implicitly at segment-register time; an Object's
/// `referenced_by_flows` is the GROUP BY over this table, and its absence
/// for a given `(object_id, flow_id)` pair is what I3 checks before a
/// Delete-object is allowed to proceed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowObjectReference {
    pub object_id: String,
    pub flow_id: Uuid,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDeleteRequest {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub timerange: Option<TimeRange>,
    pub status: DeletionStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowDeleteRequest {
    pub fn new(flow_id: Uuid, timerange: Option<TimeRange>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow_id,
            timerange,
            status: DeletionStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A registered storage backend (§9 supplement, ported from the original's
/// `StorageBackendManager`). `controlled` backends (the default one) cannot
/// be removed from the registry — invariant I7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBackend {
    pub id: String,
    pub store_type: String,
    pub provider: String,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub store_product: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub controlled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub media_store_type: String,
    pub event_stream_mechanisms: Vec<String>,
    pub capabilities: ServiceCapabilities,
    pub storage_backends: Vec<StorageBackend>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCapabilities {
    pub supports_webhooks: bool,
    pub supports_flow_deletion: bool,
    pub supports_segment_deletion: bool,
    pub supports_read_only_flows: bool,
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    pub api_key_name: Option<String>,
    pub api_key_value: Option<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub url: String,
    pub api_key_name: Option<String>,
    pub api_key_value: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<u32>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub limit: u32,
    pub next_key: Option<String>,
    pub count: Option<u64>,
    pub timerange: Option<TimeRange>,
    pub reverse_order: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventNotification<T> {
    pub event_timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCreatedEvent {
    pub flow: Flow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowUpdatedEvent {
    pub flow: Flow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDeletedEvent {
    pub flow_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsAddedEvent {
    pub flow_id: Uuid,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsDeletedEvent {
    pub flow_id: Uuid,
    pub timerange: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBulkFailure {
    pub failed_segments: Vec<SegmentFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentFailure {
    pub segment: Segment,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_variant_carries_only_its_own_fields() {
        let flow = Flow::new(Uuid::new_v4(), ContentFormat::Audio);
        match &flow {
            Flow::Audio { sample_rate, channels, .. } => {
                assert!(sample_rate.is_none());
                assert!(channels.is_none());
            }
            _ => panic!("expected Audio variant"),
        }
        assert_eq!(flow.format(), ContentFormat::Audio);
    }

    #[test]
    fn flow_round_trips_tagged_json() {
        let flow = Flow::new(Uuid::new_v4(), ContentFormat::Video);
        let json = serde_json::to_value(&flow).unwrap();
        assert_eq!(json["format"], "urn:x-nmos:format:video");
        let back: Flow = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), flow.id());
    }

    #[test]
    fn new_flow_is_not_read_only() {
        let flow = Flow::new(Uuid::new_v4(), ContentFormat::Data);
        assert!(!flow.is_read_only());
    }
}
