//! C3 — collection membership (`FlowCollection`/`SourceCollection` join
//! rows). These are thin wrappers that read/write the `flow_collection`
//! field on a `Flow::Multi` or the `source_collection` field on a `Source`;
//! kept as a separate repository file since membership changes are a
//! distinct operation family from the rest of entity CRUD (§4.3).

use crate::error::TamsError;
use crate::models::{FlowCollection, FlowCollectionItem, SourceCollection, SourceCollectionItem};
use crate::repositories::{FlowRepo, SourceRepo};
use uuid::Uuid;

pub struct CollectionRepo {
    flows: std::sync::Arc<FlowRepo>,
    sources: std::sync::Arc<SourceRepo>,
}

impl CollectionRepo {
    pub fn new(flows: std::sync::Arc<FlowRepo>, sources: std::sync::Arc<SourceRepo>) -> Self {
        Self { flows, sources }
    }

    pub async fn add_flow_member(&self, flow_id: Uuid, member: FlowCollectionItem) -> Result<FlowCollection, TamsError> {
        let flow = self.flows.get(flow_id).await?;
        let mut collection = match &flow {
            crate::models::Flow::Multi { flow_collection, .. } => flow_collection.clone(),
            _ => {
                return Err(TamsError::BadRequest(format!(
                    "flow '{flow_id}' is not a multi-essence flow"
                )))
            }
        };
        collection.flows.retain(|f| f.flow_id != member.flow_id);
        collection.flows.push(member);
        self.flows.set_flow_collection(flow_id, collection.clone()).await?;
        Ok(collection)
    }

    pub async fn remove_flow_member(&self, flow_id: Uuid, member_id: Uuid) -> Result<FlowCollection, TamsError> {
        let flow = self.flows.get(flow_id).await?;
        let mut collection = match &flow {
            crate::models::Flow::Multi { flow_collection, .. } => flow_collection.clone(),
            _ => {
                return Err(TamsError::BadRequest(format!(
                    "flow '{flow_id}' is not a multi-essence flow"
                )))
            }
        };
        collection.flows.retain(|f| f.flow_id != member_id);
        self.flows.set_flow_collection(flow_id, collection.clone()).await?;
        Ok(collection)
    }

    pub async fn add_source_member(&self, source_id: Uuid, member: SourceCollectionItem) -> Result<SourceCollection, TamsError> {
        let mut source = self.sources.get(source_id).await?;
        let mut collection = source.source_collection.take().unwrap_or_default();
        collection.sources.retain(|s| s.source_id != member.source_id);
        collection.sources.push(member);
        source.source_collection = Some(collection.clone());
        self.sources.update(&source).await?;
        Ok(collection)
    }

    pub async fn get_source_collection(&self, source_id: Uuid) -> Result<SourceCollection, TamsError> {
        let source = self.sources.get(source_id).await?;
        Ok(source.source_collection.unwrap_or_default())
    }

    /// PUT /sources/{id}/source_collection — diff-sync (spec.md §6.1): the
    /// body is the full desired membership list, not a single add/remove.
    pub async fn set_source_collection(
        &self,
        source_id: Uuid,
        collection: SourceCollection,
    ) -> Result<SourceCollection, TamsError> {
        let mut source = self.sources.get(source_id).await?;
        source.source_collection = Some(collection.clone());
        self.sources.update(&source).await?;
        Ok(collection)
    }
}
