//! Process-wide storage-backend registry (§9 supplement), ported from
//! `original_source/app/storage/storage_backend_manager.py`
//! (`StorageBackendManager`). Read-mostly; guarded by a `RwLock` the way the
//! teacher guards its `WebhookManager` registry in `webhooks.rs`.

use crate::error::TamsError;
use crate::models::StorageBackend;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_BACKEND_ID: &str = "default";

#[derive(Clone)]
pub struct StorageBackendRegistry {
    backends: Arc<RwLock<HashMap<String, StorageBackend>>>,
    default_id: String,
}

impl StorageBackendRegistry {
    /// Seeds the registry with a single S3-compatible backend under
    /// `default_id` (§6.4's `default_storage_backend_id`), as
    /// `StorageBackendManager.__init__` does.
    pub fn new(provider: &str, region: Option<String>, label: Option<String>) -> Self {
        Self::with_default_id(DEFAULT_BACKEND_ID, provider, region, label)
    }

    pub fn with_default_id(default_id: &str, provider: &str, region: Option<String>, label: Option<String>) -> Self {
        let mut backends = HashMap::new();
        backends.insert(
            default_id.to_string(),
            StorageBackend {
                id: default_id.to_string(),
                store_type: "http_object_store".to_string(),
                provider: provider.to_string(),
                region,
                availability_zone: None,
                store_product: Some("S3-Compatible".to_string()),
                label,
                description: Some("default object storage backend".to_string()),
                controlled: true,
            },
        );
        Self {
            backends: Arc::new(RwLock::new(backends)),
            default_id: default_id.to_string(),
        }
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub async fn get(&self, id: &str) -> Result<StorageBackend, TamsError> {
        self.backends
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TamsError::NotFound(format!("storage backend '{id}' not found")))
    }

    pub async fn list(&self) -> Vec<StorageBackend> {
        self.backends.read().await.values().cloned().collect()
    }

    pub async fn add(&self, backend: StorageBackend) -> Result<(), TamsError> {
        let mut backends = self.backends.write().await;
        if backends.contains_key(&backend.id) {
            return Err(TamsError::Conflict(format!(
                "storage backend '{}' already exists",
                backend.id
            )));
        }
        backends.insert(backend.id.clone(), backend);
        Ok(())
    }

    /// Invariant I7: the default/controlled backend can never be removed.
    pub async fn remove(&self, id: &str) -> Result<(), TamsError> {
        if id == self.default_id {
            return Err(TamsError::Forbidden(
                "the default storage backend cannot be removed".to_string(),
            ));
        }
        let mut backends = self.backends.write().await;
        match backends.get(id) {
            Some(b) if b.controlled => Err(TamsError::Forbidden(format!(
                "storage backend '{id}' is controlled and cannot be removed"
            ))),
            Some(_) => {
                backends.remove(id);
                Ok(())
            }
            None => Err(TamsError::NotFound(format!("storage backend '{id}' not found"))),
        }
    }

    pub async fn update(&self, id: &str, mutate: impl FnOnce(&mut StorageBackend)) -> Result<StorageBackend, TamsError> {
        let mut backends = self.backends.write().await;
        let backend = backends
            .get_mut(id)
            .ok_or_else(|| TamsError::NotFound(format!("storage backend '{id}' not found")))?;
        mutate(backend);
        Ok(backend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeds_default_backend() {
        let registry = StorageBackendRegistry::new("S3-Compatible", None, None);
        let backend = registry.get(DEFAULT_BACKEND_ID).await.unwrap();
        assert!(backend.controlled);
    }

    #[tokio::test]
    async fn default_backend_cannot_be_removed() {
        let registry = StorageBackendRegistry::new("S3-Compatible", None, None);
        assert!(registry.remove(DEFAULT_BACKEND_ID).await.is_err());
    }

    #[tokio::test]
    async fn additional_backends_can_be_added_and_removed() {
        let registry = StorageBackendRegistry::new("S3-Compatible", None, None);
        registry
            .add(StorageBackend {
                id: "secondary".to_string(),
                store_type: "http_object_store".to_string(),
                provider: "S3-Compatible".to_string(),
                region: None,
                availability_zone: None,
                store_product: None,
                label: None,
                description: None,
                controlled: false,
            })
            .await
            .unwrap();
        assert_eq!(registry.list().await.len(), 2);
        registry.remove("secondary").await.unwrap();
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn adding_duplicate_id_conflicts() {
        let registry = StorageBackendRegistry::new("S3-Compatible", None, None);
        let dup = StorageBackend {
            id: DEFAULT_BACKEND_ID.to_string(),
            store_type: "http_object_store".to_string(),
            provider: "S3-Compatible".to_string(),
            region: None,
            availability_zone: None,
            store_product: None,
            label: None,
            description: None,
            controlled: false,
        };
        assert!(registry.add(dup).await.is_err());
    }
}
