//! C6 — segment pipeline: the three-phase allocate/upload/register protocol.
//!
//! Grounded on `original_source/app/storage/endpoints/segments/segments_storage.py`
//! (`SegmentsStorage.create_segment`/`create_segment_metadata`) and
//! `flows_storage.py`'s storage-allocation endpoint, generalized from the
//! teacher's filesystem `allocate_storage` in `storage.rs` to presigned S3
//! URLs.

use crate::error::TamsError;
use crate::models::{GetUrl, Segment};
use crate::object_store::{object_key, ObjectStore};
use crate::repositories::{FlowRepo, ObjectRepo, SegmentRepo};
use crate::storage_backend::StorageBackendRegistry;
use crate::time_range::TimeRange;
use chrono::Utc;
use uuid::Uuid;

/// Result of Phase A: an object id, the canonical storage key it was
/// allocated under, and a presigned PUT URL the client uses to upload the
/// segment's bytes directly to the object store.
pub struct StorageAllocation {
    pub object_id: String,
    pub storage_path: String,
    pub put_url: String,
}

/// Phase A — allocate a storage key and a presigned PUT URL for each of
/// `count` freshly-minted object ids, or, when `object_ids` is given,
/// for each id in that list after confirming none of them already exist
/// (I6: an Object's bytes are write-once, so allocating over an existing
/// id must fail rather than silently overwrite it). No metadata row is
/// created yet; the object only becomes visible to readers once Phase C
/// registers it (§4.6).
pub async fn allocate(
    objects: &ObjectRepo,
    object_store: &ObjectStore,
    storage_path_prefix: &str,
    object_ids: Option<Vec<String>>,
    count: u32,
) -> Result<Vec<StorageAllocation>, TamsError> {
    let ids = match object_ids {
        Some(ids) => {
            for id in &ids {
                if objects.try_get(id).await?.is_some() {
                    return Err(TamsError::ObjectAlreadyExists { object_id: id.clone() });
                }
            }
            ids
        }
        None => (0..count).map(|_| Uuid::new_v4().to_string()).collect(),
    };

    let mut allocations = Vec::with_capacity(ids.len());
    for object_id in ids {
        let key = object_key(storage_path_prefix, &object_id, Utc::now());
        let put_url = object_store.presign_put(&key).await?;
        allocations.push(StorageAllocation { object_id, storage_path: key, put_url });
    }
    Ok(allocations)
}

/// Phase C — register a segment against an already-uploaded object. Confirms
/// the object actually exists via HEAD (the client may not have uploaded
/// yet, or may have uploaded to the wrong key), creates/updates the `Object`
/// row, inserts the segment, and widens the flow's `available_timerange`.
///
/// `storage_path` should be the key echoed back from the Phase A allocation
/// response; it is persisted on the segment and used for every later GET so
/// an allocate/register pair spanning a UTC day boundary can't land on two
/// different derived keys. A client that omits it falls back to the same
/// derivation `allocate` uses, keyed off "now" rather than allocation time.
pub async fn register(
    flows: &FlowRepo,
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    object_store: &ObjectStore,
    storage_path_prefix: &str,
    flow_id: Uuid,
    object_id: String,
    storage_path: Option<String>,
    timerange: TimeRange,
    ts_offset: Option<String>,
    last_duration: Option<String>,
    sample_offset: Option<u64>,
    sample_count: Option<u64>,
    key_frame_count: Option<u32>,
) -> Result<Segment, TamsError> {
    let flow = flows.get(flow_id).await?;
    if flow.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: flow_id.to_string() });
    }

    let key = storage_path
        .clone()
        .unwrap_or_else(|| object_key(storage_path_prefix, &object_id, Utc::now()));
    let head = object_store.head(&key).await.map_err(|e| match e {
        TamsError::NotFound(_) => TamsError::BadRequest(format!(
            "object '{object_id}' has not been uploaded to the allocated key"
        )),
        other => other,
    })?;

    objects
        .add_reference(&object_id, flow_id, Some(head.size_bytes), head.content_type)
        .await?;

    let segment = Segment {
        flow_id,
        object_id,
        timerange,
        ts_offset,
        last_duration,
        sample_offset,
        sample_count,
        key_frame_count,
        get_urls: Vec::new(),
        created_at: Utc::now(),
        storage_path: Some(key),
    };
    segments.create(&segment).await?;
    flows.extend_available_timerange(flow_id, timerange).await?;

    Ok(segment)
}

/// Inline-upload variant of Phase C, used when the client submits the
/// segment's bytes directly in the registration request (`multipart/
/// form-data` with a `file` part, §6.1) rather than going through the
/// presigned-URL dance of Phases A/B. The core PUTs the bytes itself, so
/// there is no HEAD round-trip to confirm an out-of-band upload — size and
/// content type are known up front from what was just written.
#[allow(clippy::too_many_arguments)]
pub async fn register_with_inline_upload(
    flows: &FlowRepo,
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    object_store: &ObjectStore,
    storage_path_prefix: &str,
    flow_id: Uuid,
    object_id: String,
    content_type: Option<&str>,
    data: Vec<u8>,
    timerange: TimeRange,
    ts_offset: Option<String>,
    last_duration: Option<String>,
    sample_offset: Option<u64>,
    sample_count: Option<u64>,
    key_frame_count: Option<u32>,
) -> Result<Segment, TamsError> {
    let flow = flows.get(flow_id).await?;
    if flow.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: flow_id.to_string() });
    }

    let key = object_key(storage_path_prefix, &object_id, Utc::now());
    let size = data.len() as u64;
    object_store.put(&key, data, content_type).await?;
    objects
        .add_reference(&object_id, flow_id, Some(size), content_type.map(str::to_string))
        .await?;

    let segment = Segment {
        flow_id,
        object_id,
        timerange,
        ts_offset,
        last_duration,
        sample_offset,
        sample_count,
        key_frame_count,
        get_urls: Vec::new(),
        created_at: Utc::now(),
        storage_path: Some(key),
    };
    segments.create(&segment).await?;
    flows.extend_available_timerange(flow_id, timerange).await?;

    Ok(segment)
}

/// Read path: re-synthesizes presigned GET URLs for a batch of segments,
/// decorated with storage-backend metadata, since the URLs embedded at
/// write time (if any) would have long since expired (§4.6 "Read path").
pub async fn decorate_get_urls(
    object_store: &ObjectStore,
    backends: &StorageBackendRegistry,
    storage_path_prefix: &str,
    default_backend_id: &str,
    mut segment: Segment,
) -> Result<Segment, TamsError> {
    let backend = backends.get(default_backend_id).await?;
    let key = segment
        .storage_path
        .clone()
        .unwrap_or_else(|| object_key(storage_path_prefix, &segment.object_id, segment.created_at));
    let url = object_store.presign_get(&key).await?;
    segment.get_urls = vec![GetUrl {
        url,
        label: backend.label.clone(),
        storage_id: backend.id.clone(),
        presigned: true,
        controlled: backend.controlled,
    }];
    Ok(segment)
}
