//! Thin HTTP handlers over the core components. The HTTP/REST framing layer
//! itself is an external collaborator (spec.md §1); these functions only
//! parse requests, call into C3/C4/C6, and serialize the result — no
//! business logic lives here.

use crate::{
    config::AppConfig,
    deletion_worker::DeletionWorker,
    error::{TamsError, TamsResult},
    integrity,
    models::*,
    object_store::ObjectStore,
    repositories::{CollectionRepo, FlowDeleteRequestRepo, FlowRepo, ObjectRepo, SegmentRepo, SourceRepo},
    segment_pipeline,
    storage_backend::StorageBackendRegistry,
    time_range::TimeRange,
    validation,
    webhooks::WebhookManager,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub config: AppConfig,
    pub sources: Arc<SourceRepo>,
    pub flows: Arc<FlowRepo>,
    pub segments: Arc<SegmentRepo>,
    pub objects: Arc<ObjectRepo>,
    pub collections: Arc<CollectionRepo>,
    pub delete_requests: Arc<FlowDeleteRequestRepo>,
    pub object_store: Arc<ObjectStore>,
    pub storage_backends: Arc<StorageBackendRegistry>,
    pub webhook_manager: Arc<WebhookManager>,
    pub deletion_worker: Arc<DeletionWorker>,
}

fn parse_limit(params: &HashMap<String, String>, default: u32, max: u32) -> u32 {
    params
        .get("limit")
        .and_then(|l| l.parse::<u32>().ok())
        .unwrap_or(default)
        .min(max)
}

fn parse_timerange(params: &HashMap<String, String>) -> Result<Option<TimeRange>, TamsError> {
    params.get("timerange").map(|s| TimeRange::parse(s)).transpose()
}

pub async fn get_root() -> Result<Json<Value>, TamsError> {
    Ok(Json(json!({
        "name": "TAMS API Server",
        "description": "Time-addressable Media Store API",
        "version": "7.0"
    })))
}

pub async fn get_service_info(State(state): State<AppState>) -> Result<Json<ServiceInfo>, TamsError> {
    let info = ServiceInfo {
        name: state.config.service.name.clone(),
        description: state.config.service.description.clone(),
        version: state.config.service.version.clone(),
        media_store_type: state.config.service.media_store_type.clone(),
        event_stream_mechanisms: vec!["webhooks".to_string()],
        capabilities: ServiceCapabilities {
            supports_webhooks: true,
            supports_flow_deletion: true,
            supports_segment_deletion: true,
            supports_read_only_flows: true,
            max_file_size: u64::MAX,
        },
        storage_backends: state.storage_backends.list().await,
    };
    Ok(Json(info))
}

// -- Sources ---------------------------------------------------------------

pub async fn list_sources(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<Value>, TamsError> {
    let limit = parse_limit(&params, state.config.pagination.default_limit, state.config.pagination.max_limit);
    let filters = crate::repositories::source::SourceListFilters {
        label: params.get("label").cloned(),
        format: params.get("format").and_then(|f| ContentFormat::from_urn(f)),
    };
    let sources = state.sources.list(filters, limit).await?;
    Ok(Json(json!({
        "sources": sources,
        "pagination": { "limit": limit, "count": sources.len() }
    })))
}

pub async fn get_source(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Source>, TamsError> {
    Ok(Json(state.sources.get(id).await?))
}

/// Format is immutable once a Source is created, so unlike
/// `CreateSourceRequest` this carries no `format` field.
#[derive(Debug, Deserialize)]
pub struct PutSourceRequest {
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub id: Option<Uuid>,
    pub format: ContentFormat,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

pub async fn create_source(
    State(state): State<AppState>,
    Json(payload): Json<CreateSourceRequest>,
) -> Result<(StatusCode, Json<Source>), TamsError> {
    let id = payload.id.unwrap_or_else(Uuid::new_v4);
    if state.sources.try_get_opt(id).await?.is_some() {
        return Err(TamsError::Conflict(format!("source '{id}' already exists")));
    }
    let mut source = Source::new(id, payload.format);
    source.label = payload.label;
    source.description = payload.description;
    source.tags = payload.tags;
    state.sources.create(&source).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

/// Updates an existing Source (spec.md §6.1: `PUT /sources/{id}` is
/// update-only, 404 if absent — creation goes through `POST /sources`).
pub async fn put_source(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<PutSourceRequest>,
) -> Result<Json<Source>, TamsError> {
    let mut existing = state.sources.get(id).await?;
    existing.label = payload.label;
    existing.description = payload.description;
    existing.tags = payload.tags;
    existing.updated_at = chrono::Utc::now();
    state.sources.update(&existing).await?;
    Ok(Json(existing))
}

pub async fn delete_source(
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    let cascade = params.get("cascade").map(|v| v == "true").unwrap_or(false);
    integrity::delete_source(&state.sources, &state.flows, &state.segments, &state.objects, id, cascade).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_source_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(label): Json<Option<String>>,
) -> Result<Json<Source>, TamsError> {
    if let Some(ref l) = label {
        validation::validate_label(l)?;
    }
    Ok(Json(state.sources.set_label(id, label).await?))
}

pub async fn set_source_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(description): Json<Option<String>>,
) -> Result<Json<Source>, TamsError> {
    Ok(Json(state.sources.set_description(id, description).await?))
}

pub async fn set_source_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(tags): Json<HashMap<String, String>>,
) -> Result<Json<Source>, TamsError> {
    Ok(Json(state.sources.set_tags(id, tags).await?))
}

pub async fn get_source_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, TamsError> {
    Ok(Json(state.sources.get(id).await?.tags))
}

pub async fn delete_source_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.sources.set_tags(id, HashMap::new()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_source_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<String>>, TamsError> {
    Ok(Json(state.sources.get(id).await?.label))
}

pub async fn delete_source_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.sources.set_label(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_source_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<String>>, TamsError> {
    Ok(Json(state.sources.get(id).await?.description))
}

pub async fn delete_source_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.sources.set_description(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_source_collection(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SourceCollection>, TamsError> {
    Ok(Json(state.collections.get_source_collection(id).await?))
}

pub async fn put_source_collection(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(collection): Json<SourceCollection>,
) -> Result<Json<SourceCollection>, TamsError> {
    Ok(Json(state.collections.set_source_collection(id, collection).await?))
}

// -- Flows -------------------------------------------------------------------

pub async fn list_flows(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<Value>, TamsError> {
    let limit = parse_limit(&params, state.config.pagination.default_limit, state.config.pagination.max_limit);
    let filters = crate::repositories::flow::FlowListFilters {
        source_id: params.get("source_id").and_then(|s| s.parse().ok()),
        format: params.get("format").and_then(|f| ContentFormat::from_urn(f)),
        codec: params.get("codec").cloned(),
        frame_width: params.get("frame_width").and_then(|v| v.parse().ok()),
        frame_height: params.get("frame_height").and_then(|v| v.parse().ok()),
    };
    let flows = state.flows.list(filters, limit).await?;
    Ok(Json(json!({
        "flows": flows,
        "pagination": { "limit": limit, "count": flows.len() }
    })))
}

pub async fn get_flow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.get(id).await?))
}

pub async fn create_flow(
    State(state): State<AppState>,
    Json(flow): Json<Flow>,
) -> Result<(StatusCode, Json<Flow>), TamsError> {
    if let Some(codec) = flow.core().codec.as_deref() {
        validation::validate_mime_type(codec)?;
    }
    if let Some(container) = flow.core().container.as_deref() {
        validation::validate_mime_type(container)?;
    }
    match state.flows.get(flow.id()).await {
        Ok(_) => Err(TamsError::Conflict(format!("flow '{}' already exists", flow.id()))),
        Err(TamsError::FlowNotFound { .. }) => {
            state.flows.create(&flow).await?;
            Ok((StatusCode::CREATED, Json(flow)))
        }
        Err(e) => Err(e),
    }
}

/// Updates an existing Flow (spec.md §6.1: `PUT /flows/{id}` is update-only,
/// 404 if absent — creation goes through `POST /flows`).
pub async fn put_flow(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(mut flow): Json<Flow>,
) -> Result<Json<Flow>, TamsError> {
    if flow.id() != id {
        return Err(TamsError::BadRequest(
            "flow id in path must match flow id in body".to_string(),
        ));
    }
    if let Some(codec) = flow.core().codec.as_deref() {
        validation::validate_mime_type(codec)?;
    }
    if let Some(container) = flow.core().container.as_deref() {
        validation::validate_mime_type(container)?;
    }
    let existing = state.flows.get(id).await?;
    if existing.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: id.to_string() });
    }
    flow.core_mut().updated_at = chrono::Utc::now();
    state.flows.update(&flow).await?;
    Ok(Json(flow))
}

pub async fn delete_flow(
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    let cascade = params.get("cascade").map(|v| v == "true").unwrap_or(false);
    integrity::delete_flow(&state.flows, &state.segments, &state.objects, id, cascade).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_flow_read_only(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(read_only): Json<bool>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_read_only(id, read_only).await?))
}

pub async fn set_flow_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(label): Json<Option<String>>,
) -> Result<Json<Flow>, TamsError> {
    if let Some(ref l) = label {
        validation::validate_label(l)?;
    }
    Ok(Json(state.flows.set_label(id, label).await?))
}

pub async fn set_flow_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(description): Json<Option<String>>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_description(id, description).await?))
}

pub async fn set_flow_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(tags): Json<HashMap<String, String>>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_tags(id, tags).await?))
}

pub async fn get_flow_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, TamsError> {
    Ok(Json(state.flows.get(id).await?.core().tags.clone()))
}

pub async fn delete_flow_tags(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_tags(id, HashMap::new()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<String>>, TamsError> {
    Ok(Json(state.flows.get(id).await?.core().label.clone()))
}

pub async fn delete_flow_label(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_label(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<String>>, TamsError> {
    Ok(Json(state.flows.get(id).await?.core().description.clone()))
}

pub async fn delete_flow_description(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_description(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_read_only(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<bool>, TamsError> {
    Ok(Json(state.flows.get(id).await?.is_read_only()))
}

pub async fn delete_flow_read_only(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_read_only(id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_max_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<u64>>, TamsError> {
    Ok(Json(state.flows.get(id).await?.core().max_bit_rate))
}

pub async fn delete_flow_max_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_max_bit_rate(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_avg_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Option<u64>>, TamsError> {
    Ok(Json(state.flows.get(id).await?.core().avg_bit_rate))
}

pub async fn delete_flow_avg_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_avg_bit_rate(id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_flow_collection(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<FlowCollection>, TamsError> {
    match state.flows.get(id).await? {
        Flow::Multi { flow_collection, .. } => Ok(Json(flow_collection)),
        other => Err(TamsError::BadRequest(format!(
            "flow '{}' is a {:?} flow and has no flow_collection",
            id,
            other.format()
        ))),
    }
}

pub async fn put_flow_collection(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(collection): Json<FlowCollection>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_flow_collection(id, collection).await?))
}

pub async fn delete_flow_collection(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, TamsError> {
    state.flows.set_flow_collection(id, FlowCollection::default()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_flow_max_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(value): Json<Option<u64>>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_max_bit_rate(id, value).await?))
}

pub async fn set_flow_avg_bit_rate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(value): Json<Option<u64>>,
) -> Result<Json<Flow>, TamsError> {
    Ok(Json(state.flows.set_avg_bit_rate(id, value).await?))
}

pub async fn add_flow_collection_member(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(member): Json<FlowCollectionItem>,
) -> Result<Json<FlowCollection>, TamsError> {
    Ok(Json(state.collections.add_flow_member(id, member).await?))
}

pub async fn remove_flow_collection_member(
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
) -> Result<Json<FlowCollection>, TamsError> {
    Ok(Json(state.collections.remove_flow_member(id, member_id).await?))
}

// -- Segments & the three-phase storage pipeline ----------------------------

pub async fn list_flow_segments(
    Path(flow_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<Value>, TamsError> {
    let limit = parse_limit(&params, state.config.pagination.default_limit, state.config.pagination.max_limit);
    let range = parse_timerange(&params)?;
    let segments = state.segments.list_for_flow(flow_id, range, limit).await?;

    let mut decorated = Vec::with_capacity(segments.len());
    for segment in segments {
        decorated.push(
            segment_pipeline::decorate_get_urls(
                &state.object_store,
                &state.storage_backends,
                &state.config.object_store.tams_storage_path,
                &state.config.service.default_storage_backend_id,
                segment,
            )
            .await?,
        );
    }

    Ok(Json(json!({
        "segments": decorated,
        "pagination": { "limit": limit, "count": decorated.len() }
    })))
}

#[derive(Debug, Deserialize)]
pub struct AllocateStorageRequest {
    #[serde(default)]
    pub object_ids: Option<Vec<String>>,
    #[serde(default = "default_allocation_count")]
    pub limit: u32,
}

fn default_allocation_count() -> u32 {
    10
}

/// Phase A: POST /flows/{id}/storage
pub async fn allocate_storage(
    Path(flow_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AllocateStorageRequest>,
) -> Result<Json<Value>, TamsError> {
    let flow = state.flows.get(flow_id).await?;
    if flow.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: flow_id.to_string() });
    }
    let allocations = segment_pipeline::allocate(
        &state.objects,
        &state.object_store,
        &state.config.object_store.tams_storage_path,
        payload.object_ids,
        payload.limit,
    )
    .await?;
    let objects: Vec<Value> = allocations
        .into_iter()
        .map(|a| json!({ "object_id": a.object_id, "put_url": a.put_url, "storage_path": a.storage_path }))
        .collect();
    Ok(Json(json!({ "media_objects": objects })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterSegmentRequest {
    pub object_id: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    pub timerange: String,
    pub ts_offset: Option<String>,
    pub last_duration: Option<String>,
    pub sample_offset: Option<u64>,
    pub sample_count: Option<u64>,
    pub key_frame_count: Option<u32>,
}

/// Phase C: POST /flows/{id}/segments. Always `multipart/form-data` per
/// §6.1 — a `segment_data` JSON part carries the `RegisterSegmentRequest`,
/// and an optional `file` part carries the bytes. When `file` is present
/// the core takes the inline-upload path (PUTs the bytes itself); otherwise
/// it expects Phase B already landed the bytes at the allocated key.
pub async fn add_flow_segment(
    Path(flow_id): Path<Uuid>,
    State(state): State<AppState>,
    mut multipart: axum::extract::Multipart,
) -> Result<Json<Segment>, TamsError> {
    let mut payload: Option<RegisterSegmentRequest> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TamsError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("segment_data") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| TamsError::BadRequest(format!("invalid segment_data part: {e}")))?;
                payload = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| TamsError::ValidationError(format!("invalid segment_data JSON: {e}")))?,
                );
            }
            Some("file") => {
                file_content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| TamsError::BadRequest(format!("invalid file part: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let payload = payload
        .ok_or_else(|| TamsError::ValidationError("missing required segment_data part".to_string()))?;
    let timerange = TimeRange::parse(&payload.timerange)?;

    let segment = match file_bytes {
        Some(data) => {
            segment_pipeline::register_with_inline_upload(
                &state.flows,
                &state.segments,
                &state.objects,
                &state.object_store,
                &state.config.object_store.tams_storage_path,
                flow_id,
                payload.object_id,
                file_content_type.as_deref(),
                data,
                timerange,
                payload.ts_offset,
                payload.last_duration,
                payload.sample_offset,
                payload.sample_count,
                payload.key_frame_count,
            )
            .await?
        }
        None => {
            segment_pipeline::register(
                &state.flows,
                &state.segments,
                &state.objects,
                &state.object_store,
                &state.config.object_store.tams_storage_path,
                flow_id,
                payload.object_id,
                payload.storage_path,
                timerange,
                payload.ts_offset,
                payload.last_duration,
                payload.sample_offset,
                payload.sample_count,
                payload.key_frame_count,
            )
            .await?
        }
    };

    state
        .webhook_manager
        .send_notification(EventNotification {
            event_timestamp: chrono::Utc::now(),
            event_type: "segments_added".to_string(),
            event: SegmentsAddedEvent { flow_id, segments: vec![segment.clone()] },
        })
        .await;

    Ok(Json(segment))
}

pub async fn delete_flow_segments(
    Path(flow_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Json<Value>, TamsError> {
    let range = parse_timerange(&params)?;
    let outcome = integrity::delete_segments(
        &state.flows,
        &state.segments,
        &state.objects,
        &state.delete_requests,
        flow_id,
        range,
        state.config.deletion.async_delete_threshold,
    )
    .await?;

    match outcome {
        integrity::SegmentDeleteOutcome::Completed(deleted) => Ok(Json(json!({
            "status": "completed",
            "deleted_count": deleted.len()
        }))),
        integrity::SegmentDeleteOutcome::Promoted(request) => Ok(Json(json!({
            "status": "accepted",
            "delete_request_id": request.id
        }))),
    }
}

// -- Objects -----------------------------------------------------------------

pub async fn get_object(Path(object_id): Path<String>, State(state): State<AppState>) -> Result<Json<Object>, TamsError> {
    Ok(Json(state.objects.get(&object_id).await?))
}

pub async fn head_object(Path(object_id): Path<String>, State(state): State<AppState>) -> TamsResult<StatusCode> {
    state.objects.get(&object_id).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_object(Path(object_id): Path<String>, State(state): State<AppState>) -> TamsResult<StatusCode> {
    integrity::delete_object(&state.objects, &object_id).await?;
    Ok(StatusCode::OK)
}

// -- Flow delete requests (C7) -----------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct CreateFlowDeleteRequest {
    pub flow_id: Uuid,
    pub timerange: Option<String>,
}

/// `POST /flow-delete-requests` (§6.1) — the standalone enqueue endpoint;
/// `flow_id` travels in the body rather than the path since a request isn't
/// scoped under `/flows/{id}/...` here.
pub async fn request_flow_deletion(
    State(state): State<AppState>,
    Json(payload): Json<CreateFlowDeleteRequest>,
) -> Result<Json<FlowDeleteRequest>, TamsError> {
    let flow_id = payload.flow_id;
    let timerange = payload.timerange.as_deref().map(TimeRange::parse).transpose()?;

    if let Some(existing) = state.deletion_worker.find_existing(flow_id, timerange).await? {
        return Ok(Json(existing));
    }

    let request = FlowDeleteRequest::new(flow_id, timerange);
    state.delete_requests.create(&request).await?;
    Ok(Json(request))
}

pub async fn list_flow_delete_requests(State(state): State<AppState>) -> Result<Json<Value>, TamsError> {
    let mut requests = Vec::new();
    for status in [DeletionStatus::Pending, DeletionStatus::InProgress, DeletionStatus::Completed, DeletionStatus::Failed] {
        requests.extend(state.delete_requests.list_by_status(status, 1000).await?);
    }
    Ok(Json(json!({ "flow_delete_requests": requests })))
}

pub async fn get_flow_delete_request(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<FlowDeleteRequest>, TamsError> {
    Ok(Json(state.delete_requests.get(id).await?))
}

// -- Webhooks -----------------------------------------------------------------

pub async fn list_webhooks(State(state): State<AppState>) -> Result<Json<Value>, TamsError> {
    Ok(Json(json!({ "count": state.webhook_manager.get_webhook_count().await })))
}

pub async fn create_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookRequest>,
) -> Result<Json<Webhook>, TamsError> {
    let webhook = Webhook {
        url: payload.url,
        api_key_name: payload.api_key_name,
        api_key_value: None,
        events: payload.events,
    };
    state.webhook_manager.add_webhook(webhook.clone(), payload.api_key_value).await;
    Ok(Json(webhook))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(webhook_url): Path<String>,
) -> TamsResult<StatusCode> {
    state.webhook_manager.remove_webhook(&webhook_url).await;
    Ok(StatusCode::NO_CONTENT)
}

// -- Storage backends (§9 supplement) -----------------------------------------

pub async fn list_storage_backends(State(state): State<AppState>) -> Result<Json<Value>, TamsError> {
    Ok(Json(json!({ "storage_backends": state.storage_backends.list().await })))
}
