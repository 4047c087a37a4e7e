//! C4 — reference & integrity engine.
//!
//! Grounded on `FlowsStorage.delete_flow`'s cascade flag in
//! `original_source/app/storage/endpoints/flows/flows_storage.py`: deleting
//! a flow with `cascade=False` while dependent segments exist is rejected
//! (mapped here to `TamsError::DependentEntitiesExist`, HTTP 409) rather than
//! the original's bare `ValueError`. These functions take repository handles
//! rather than owning them, so the suspending I/O stays in the repositories
//! and this module's branching logic is easy to read as pure decision-making
//! (§5).

use crate::error::TamsError;
use crate::models::{DeletionStatus, FlowDeleteRequest, Segment};
use crate::repositories::{FlowDeleteRequestRepo, FlowRepo, ObjectRepo, SegmentRepo, SourceRepo};
use crate::time_range::TimeRange;
use uuid::Uuid;

/// Default for §6.4's `async_delete_threshold` — range-deletes with more
/// overlapping segments than this are promoted to the async worker instead
/// of running inline (§4.4). The live value is read from `AppConfig` and
/// threaded in by callers; this is only the documented default.
pub const DEFAULT_ASYNC_DELETE_THRESHOLD: usize = 500;

pub enum SegmentDeleteOutcome {
    Completed(Vec<Segment>),
    Promoted(FlowDeleteRequest),
}

/// Deletes a source. With `cascade=false`, refuses if any Flow still
/// references it (I4). With `cascade=true`, cascade-deletes every dependent
/// Flow (and in turn its Segments) before removing the Source row. Object
/// rows and bytes are never touched (§4.4 "Delete-source").
pub async fn delete_source(
    sources: &SourceRepo,
    flows: &FlowRepo,
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    source_id: Uuid,
    cascade: bool,
) -> Result<(), TamsError> {
    sources.get(source_id).await?;
    let filters = crate::repositories::flow::FlowListFilters {
        source_id: Some(source_id),
        ..Default::default()
    };
    let dependents = flows.list(filters, u32::MAX).await?;

    if !dependents.is_empty() && !cascade {
        return Err(TamsError::DependentEntitiesExist(format!(
            "source '{source_id}' has {} dependent flow(s); pass cascade=true to delete them",
            dependents.len()
        )));
    }

    for flow in &dependents {
        delete_flow(flows, segments, objects, flow.id(), true).await?;
    }

    sources.delete(source_id).await
}

/// Deletes a flow. With `cascade=false`, refuses if segments remain.
/// With `cascade=true`, deletes all segments first (releasing object
/// references), then the flow row itself.
pub async fn delete_flow(
    flows: &FlowRepo,
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    flow_id: Uuid,
    cascade: bool,
) -> Result<(), TamsError> {
    let flow = flows.get(flow_id).await?;
    if flow.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: flow_id.to_string() });
    }

    let existing = segments.list_for_flow(flow_id, None, u32::MAX).await?;
    if !existing.is_empty() && !cascade {
        return Err(TamsError::DependentEntitiesExist(format!(
            "flow '{flow_id}' has {} segment(s); pass cascade=true to delete them",
            existing.len()
        )));
    }

    if !existing.is_empty() {
        let deleted = segments.delete_range(flow_id, None).await?;
        release_object_references(objects, flow_id, &deleted).await?;
    }

    flows.delete(flow_id).await
}

/// Deletes segments overlapping `range` (or the whole timeline if `None`),
/// promoting range-deletes with more than `threshold` overlapping rows to
/// the async worker per §4.4.
pub async fn delete_segments(
    flows: &FlowRepo,
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    delete_requests: &FlowDeleteRequestRepo,
    flow_id: Uuid,
    range: Option<TimeRange>,
    threshold: usize,
) -> Result<SegmentDeleteOutcome, TamsError> {
    let flow = flows.get(flow_id).await?;
    if flow.is_read_only() {
        return Err(TamsError::ReadOnlyFlow { flow_id: flow_id.to_string() });
    }

    if let Some(r) = range {
        let overlapping = segments.count_overlapping(flow_id, r).await?;
        if overlapping > threshold {
            let req = FlowDeleteRequest::new(flow_id, Some(r));
            delete_requests.create(&req).await?;
            return Ok(SegmentDeleteOutcome::Promoted(req));
        }
    }

    let deleted = segments.delete_range(flow_id, range).await?;
    release_object_references(objects, flow_id, &deleted).await?;
    Ok(SegmentDeleteOutcome::Completed(deleted))
}

/// Deletes an Object's row. Guarded by I3: refuses while any Flow still
/// references it. The physical bytes are left in place either way — an
/// out-of-band compactor, not this engine, sweeps orphaned keys (§4.4
/// "Delete-object").
pub async fn delete_object(objects: &ObjectRepo, object_id: &str) -> Result<(), TamsError> {
    let object = objects.get(object_id).await?;
    if !object.referenced_by_flows.is_empty() {
        return Err(TamsError::ObjectStillReferenced { object_id: object_id.to_string() });
    }
    objects.delete(object_id).await
}

/// Removes `flow_id`'s reference from every object backing `deleted`
/// segments. Neither the Object row nor its object-store bytes are ever
/// touched here — only `delete_object` removes a row, and even that leaves
/// the bytes for the compactor (§4.4).
async fn release_object_references(objects: &ObjectRepo, flow_id: Uuid, deleted: &[Segment]) -> Result<(), TamsError> {
    for segment in deleted {
        objects.remove_reference(&segment.object_id, flow_id).await?;
    }
    Ok(())
}

/// Executes one claimed `FlowDeleteRequest` to completion (used by C7's
/// worker loop). Batches the range-delete the same way the inline path does,
/// since by the time the worker runs, the row count may have changed.
pub async fn execute_delete_request(
    segments: &SegmentRepo,
    objects: &ObjectRepo,
    request: &FlowDeleteRequest,
) -> Result<(), TamsError> {
    if request.status != DeletionStatus::InProgress {
        return Err(TamsError::Internal(format!(
            "delete request '{}' is not in_progress (got {:?})",
            request.id, request.status
        )));
    }
    let deleted = segments.delete_range(request.flow_id, request.timerange).await?;
    release_object_references(objects, request.flow_id, &deleted).await
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_ASYNC_DELETE_THRESHOLD;

    #[test]
    fn threshold_matches_promotion_boundary() {
        assert_eq!(DEFAULT_ASYNC_DELETE_THRESHOLD, 500);
    }
}
