//! C7 — async deletion worker.
//!
//! Runs as a `tokio::task` alongside the HTTP listener, generalized from the
//! teacher's one-shot `shutdown_signal` future in `main.rs` into a
//! cooperative `CancellationToken` both the worker and the listener observe,
//! so a single Ctrl-C/SIGTERM drains both cleanly.

use crate::integrity;
use crate::models::{DeletionStatus, FlowDeleteRequest};
use crate::repositories::{FlowDeleteRequestRepo, ObjectRepo, SegmentRepo};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct DeletionWorker {
    delete_requests: Arc<FlowDeleteRequestRepo>,
    segments: Arc<SegmentRepo>,
    objects: Arc<ObjectRepo>,
    poll_interval: Duration,
}

impl DeletionWorker {
    pub fn new(delete_requests: Arc<FlowDeleteRequestRepo>, segments: Arc<SegmentRepo>, objects: Arc<ObjectRepo>) -> Self {
        Self {
            delete_requests,
            segments,
            objects,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// §6.4's `worker_poll_interval_seconds`, overriding the built-in default.
    pub fn with_poll_interval(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds.max(1));
        self
    }

    /// Drains pending `FlowDeleteRequest`s until `shutdown` fires. On
    /// shutdown, any request this worker has claimed but not finished is
    /// reverted to `pending` so it survives a restart (§4.7).
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("deletion worker shutting down");
                    return;
                }
                claim = self.delete_requests.claim_next_pending() => {
                    match claim {
                        Ok(Some(request)) => {
                            let id = request.id;
                            tokio::select! {
                                _ = shutdown.cancelled() => {
                                    if let Err(e) = self.delete_requests.revert_to_pending(id).await {
                                        tracing::error!(request_id = %id, error = %e, "failed to revert claimed delete request on shutdown");
                                    }
                                    return;
                                }
                                result = integrity::execute_delete_request(&self.segments, &self.objects, &request) => {
                                    match result {
                                        Ok(()) => {
                                            if let Err(e) = self.delete_requests.mark_completed(id).await {
                                                tracing::error!(request_id = %id, error = %e, "failed to mark delete request completed");
                                            } else {
                                                tracing::info!(request_id = %id, flow_id = %request.flow_id, "completed async segment deletion");
                                            }
                                        }
                                        Err(e) => {
                                            tracing::error!(request_id = %id, error = %e, "async segment deletion failed");
                                            if let Err(mark_err) = self.delete_requests.mark_failed(id, e.to_string()).await {
                                                tracing::error!(request_id = %id, error = %mark_err, "failed to mark delete request failed");
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        Ok(None) => {
                            tokio::select! {
                                _ = shutdown.cancelled() => return,
                                _ = tokio::time::sleep(self.poll_interval) => {}
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to poll for pending delete requests");
                            tokio::select! {
                                _ = shutdown.cancelled() => return,
                                _ = tokio::time::sleep(self.poll_interval) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    /// Finds a prior request on the same `(flow_id, timerange)`, across
    /// `pending`/`in_progress`/`completed` — re-posting an equivalent request
    /// after it reached `completed` is a no-op that returns the prior request
    /// and triggers no new work (P8, §4.7), not just a rejected duplicate
    /// while the original is still in flight. `failed` requests are not
    /// automatically retried (§4.7), but a fresh POST after a failure is
    /// treated as a new attempt rather than bounced as a duplicate.
    pub async fn find_existing(
        &self,
        flow_id: uuid::Uuid,
        timerange: Option<crate::time_range::TimeRange>,
    ) -> Result<Option<FlowDeleteRequest>, crate::error::TamsError> {
        for status in [DeletionStatus::Pending, DeletionStatus::InProgress, DeletionStatus::Completed] {
            let existing = self.delete_requests.list_by_status(status, u32::MAX).await?;
            if let Some(r) = existing.into_iter().find(|r| r.flow_id == flow_id && r.timerange == timerange) {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }
}
