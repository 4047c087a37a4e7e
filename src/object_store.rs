//! C1 — S3-compatible object store adapter.
//!
//! Grounded on `original_source/app/storage/core/s3_core.py` (`S3Core`), with
//! the idiomatic Rust client swapped in: `aws-sdk-s3` / `aws-config` /
//! `aws-credential-types`, as used for S3-compatible endpoints in
//! `examples/other_examples/*neon__libs-remote_storage-src-s3_bucket.rs.rs`.
//! This supersedes the teacher's filesystem-backed `storage.rs`.

use crate::error::TamsError;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;

pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Classification the original's `S3Core` collapses boto3 exceptions into,
/// so callers (C3/C4/C6) can map object-store failures into the C8 taxonomy
/// without depending on `aws-sdk-s3`'s error types directly.
#[derive(Debug)]
pub enum ObjectStoreError {
    NotFound(String),
    Auth(String),
    Network(String),
    Other(String),
}

impl std::fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectStoreError::NotFound(m)
            | ObjectStoreError::Auth(m)
            | ObjectStoreError::Network(m)
            | ObjectStoreError::Other(m) => write!(f, "{m}"),
        }
    }
}

impl From<ObjectStoreError> for TamsError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(m) => TamsError::NotFound(m),
            ObjectStoreError::Auth(m) => TamsError::Forbidden(m),
            ObjectStoreError::Network(m) => TamsError::StorageUnavailable(m),
            ObjectStoreError::Other(m) => TamsError::StorageError(m),
        }
    }
}

pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// S3-compatible object store, configured the way `S3Core.__init__` is in
/// the original: an explicit endpoint URL, static credentials, a bucket, and
/// an SSL toggle for on-prem deployments terminating TLS elsewhere.
pub struct ObjectStore {
    client: Client,
    bucket: String,
    presign_ttl: Duration,
}

impl ObjectStore {
    pub async fn new(
        endpoint_url: &str,
        access_key_id: &str,
        secret_access_key: &str,
        bucket: &str,
        use_ssl: bool,
        presign_ttl_secs: u64,
    ) -> Result<Self, TamsError> {
        let _ = use_ssl; // endpoint_url's own scheme governs TLS; kept for config-shape parity with the original
        let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "tams-config");
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(DEFAULT_MAX_RETRIES))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        let store = Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
            presign_ttl: Duration::from_secs(presign_ttl_secs),
        };
        store.ensure_bucket().await?;
        Ok(store)
    }

    /// `head_bucket` then `create_bucket` on 404, per `_ensure_bucket_exists`.
    pub async fn ensure_bucket(&self) -> Result<(), TamsError> {
        let head = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await;
        if head.is_ok() {
            return Ok(());
        }
        tracing::info!(bucket = %self.bucket, "bucket not found, creating");
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("create_bucket failed: {e}")))?;
        Ok(())
    }

    pub async fn put(&self, key: &str, body: Vec<u8>, content_type: Option<&str>) -> Result<(), TamsError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("put_object failed for '{key}': {e}")))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, TamsError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(key, e))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Network(format!("reading body for '{key}': {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn delete(&self, key: &str) -> Result<(), TamsError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("delete_object failed for '{key}': {e}")))?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, TamsError> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(TamsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn head(&self, key: &str) -> Result<ObjectMetadata, TamsError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(key, e))?;
        Ok(ObjectMetadata {
            size_bytes: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
        })
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, TamsError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("list_objects_v2 failed for prefix '{prefix}': {e}")))?;
        Ok(output
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect())
    }

    pub async fn copy(&self, source_key: &str, dest_key: &str) -> Result<(), TamsError> {
        let copy_source = format!("{}/{}", self.bucket, source_key);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Other(format!("copy_object failed {source_key} -> {dest_key}: {e}")))?;
        Ok(())
    }

    /// Mint a presigned PUT URL for Phase A of the segment pipeline.
    pub async fn presign_put(&self, key: &str) -> Result<String, TamsError> {
        let presign_config = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|e| ObjectStoreError::Other(format!("invalid presign ttl: {e}")))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| ObjectStoreError::Other(format!("presign PUT failed for '{key}': {e}")))?;
        Ok(presigned.uri().to_string())
    }

    /// Mint a presigned GET URL, re-synthesized on every segment read
    /// (§4.6 read path) since presigned URLs expire.
    pub async fn presign_get(&self, key: &str) -> Result<String, TamsError> {
        let presign_config = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|e| ObjectStoreError::Other(format!("invalid presign ttl: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| ObjectStoreError::Other(format!("presign GET failed for '{key}': {e}")))?;
        Ok(presigned.uri().to_string())
    }
}

fn classify_get_error<E: std::fmt::Display>(key: &str, err: E) -> ObjectStoreError {
    let msg = err.to_string();
    if msg.contains("NoSuchKey") || msg.contains("NotFound") || msg.contains("404") {
        ObjectStoreError::NotFound(format!("object '{key}' not found"))
    } else if msg.contains("AccessDenied") || msg.contains("403") {
        ObjectStoreError::Auth(format!("access denied for '{key}'"))
    } else {
        ObjectStoreError::Other(format!("object store error for '{key}': {msg}"))
    }
}

/// Canonical object key for a newly allocated object, per §6.2:
/// `{tams_storage_path}/{YYYY}/{MM}/{DD}/{object_id}`.
pub fn object_key(storage_path: &str, object_id: &str, created_at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "{}/{}/{}",
        storage_path.trim_end_matches('/'),
        created_at.format("%Y/%m/%d"),
        object_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_key_is_partitioned_by_date() {
        let created = chrono::Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        let key = object_key("media", "abc123", created);
        assert_eq!(key, "media/2024/03/07/abc123");
    }

    #[test]
    fn classify_not_found() {
        match classify_get_error("k", "NoSuchKey") {
            ObjectStoreError::NotFound(_) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
