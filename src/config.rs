use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub metadata_store: MetadataStoreConfig,
    pub object_store: ObjectStoreConfig,
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub pagination: PaginationConfig,
    pub deletion: DeletionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// §6.4 metadata-store options: the columnar store is reached through an
/// ordered endpoint list so C2's `connect` can fail over, as `VASTCore` does.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetadataStoreConfig {
    pub endpoints: Vec<String>,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// §6.4 object-store options, mirroring `S3Core.__init__`'s parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ObjectStoreConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub use_ssl: bool,
    pub tams_storage_path: String,
    pub presign_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub media_store_type: String,
    pub public_url_base: String,
    pub default_storage_backend_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub require_auth: bool,
    pub jwt_secret: String,
    pub basic_auth_username: String,
    pub basic_auth_password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

/// §4.4/§4.7: the threshold above which a range-delete is promoted to the
/// async worker, and how often the worker polls for pending requests.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeletionConfig {
    pub async_delete_threshold: usize,
    pub worker_poll_interval_seconds: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        config.try_deserialize()
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}
