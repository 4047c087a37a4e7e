mod auth;
mod config;
mod deletion_worker;
mod error;
mod handlers;
mod integrity;
mod metadata_store;
mod models;
mod object_store;
mod repositories;
mod segment_pipeline;
mod storage_backend;
mod time_range;
mod validation;
mod webhooks;

use crate::{
    auth::{auth_middleware, AuthState},
    config::AppConfig,
    deletion_worker::DeletionWorker,
    handlers::{*, AppState, AppStateInner},
    metadata_store::MetadataStore,
    object_store::ObjectStore,
    repositories::{CollectionRepo, FlowDeleteRequestRepo, FlowRepo, ObjectRepo, SegmentRepo, SourceRepo},
    storage_backend::StorageBackendRegistry,
    webhooks::WebhookManager,
};
use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};

use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_logging(&config.logging.level, &config.logging.format)?;
    info!("Starting TAMS server...");

    info!("Connecting to metadata store...");
    let metadata_store = Arc::new(
        MetadataStore::connect(
            &config.metadata_store.endpoints,
            &config.metadata_store.database,
            &config.metadata_store.user,
            &config.metadata_store.password,
        )
        .await?,
    );
    ensure_tables(&metadata_store).await?;
    info!("Metadata store ready");

    info!("Connecting to object store...");
    let object_store = Arc::new(
        ObjectStore::new(
            &config.object_store.endpoint_url,
            &config.object_store.access_key_id,
            &config.object_store.secret_access_key,
            &config.object_store.bucket,
            config.object_store.use_ssl,
            config.object_store.presign_ttl_seconds,
        )
        .await?,
    );
    info!("Object store ready");

    let sources = Arc::new(SourceRepo::new(metadata_store.clone()));
    let flows = Arc::new(FlowRepo::new(metadata_store.clone()));
    let segments = Arc::new(SegmentRepo::new(metadata_store.clone()));
    let objects = Arc::new(ObjectRepo::new(metadata_store.clone()));
    let delete_requests = Arc::new(FlowDeleteRequestRepo::new(metadata_store.clone()));
    let collections = Arc::new(CollectionRepo::new(flows.clone(), sources.clone()));

    let storage_backends = Arc::new(StorageBackendRegistry::with_default_id(
        &config.service.default_storage_backend_id,
        "S3-Compatible",
        None,
        Some(config.service.name.clone()),
    ));

    let webhook_manager = Arc::new(WebhookManager::new());

    let deletion_worker = Arc::new(
        DeletionWorker::new(delete_requests.clone(), segments.clone(), objects.clone())
            .with_poll_interval(config.deletion.worker_poll_interval_seconds),
    );

    let app_state = Arc::new(AppStateInner {
        config: config.clone(),
        sources,
        flows,
        segments,
        objects,
        collections,
        delete_requests,
        object_store,
        storage_backends,
        webhook_manager,
        deletion_worker: deletion_worker.clone(),
    });

    let shutdown_token = CancellationToken::new();
    let worker_token = shutdown_token.clone();
    let worker_handle = tokio::spawn(async move {
        deletion_worker.run(worker_token).await;
    });

    let auth_state = Arc::new(AuthState::new(app_state.config.auth.clone()));

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(get_root))
        .route("/service", get(get_service_info))
        .route("/service/storage-backends", get(list_storage_backends))
        .route("/service/webhooks", get(list_webhooks).post(create_webhook))
        .route("/service/webhooks/:webhook_url", axum::routing::delete(delete_webhook))
        .route("/sources", get(list_sources).post(create_source))
        .route(
            "/sources/:source_id",
            get(get_source).put(put_source).delete(delete_source),
        )
        .route(
            "/sources/:source_id/tags",
            get(get_source_tags).put(set_source_tags).delete(delete_source_tags),
        )
        .route(
            "/sources/:source_id/label",
            get(get_source_label).put(set_source_label).delete(delete_source_label),
        )
        .route(
            "/sources/:source_id/description",
            get(get_source_description)
                .put(set_source_description)
                .delete(delete_source_description),
        )
        .route(
            "/sources/:source_id/source_collection",
            get(get_source_collection).put(put_source_collection),
        )
        .route("/flows", get(list_flows).post(create_flow))
        .route("/flows/:flow_id", get(get_flow).put(put_flow).delete(delete_flow))
        .route(
            "/flows/:flow_id/tags",
            get(get_flow_tags).put(set_flow_tags).delete(delete_flow_tags),
        )
        .route(
            "/flows/:flow_id/label",
            get(get_flow_label).put(set_flow_label).delete(delete_flow_label),
        )
        .route(
            "/flows/:flow_id/description",
            get(get_flow_description)
                .put(set_flow_description)
                .delete(delete_flow_description),
        )
        .route(
            "/flows/:flow_id/read_only",
            get(get_flow_read_only)
                .put(set_flow_read_only)
                .delete(delete_flow_read_only),
        )
        .route(
            "/flows/:flow_id/max_bit_rate",
            get(get_flow_max_bit_rate)
                .put(set_flow_max_bit_rate)
                .delete(delete_flow_max_bit_rate),
        )
        .route(
            "/flows/:flow_id/avg_bit_rate",
            get(get_flow_avg_bit_rate)
                .put(set_flow_avg_bit_rate)
                .delete(delete_flow_avg_bit_rate),
        )
        .route(
            "/flows/:flow_id/flow_collection",
            get(get_flow_collection)
                .put(put_flow_collection)
                .post(add_flow_collection_member)
                .delete(delete_flow_collection),
        )
        .route(
            "/flows/:flow_id/flow_collection/:member_id",
            axum::routing::delete(remove_flow_collection_member),
        )
        .route(
            "/flows/:flow_id/segments",
            get(list_flow_segments).post(add_flow_segment).delete(delete_flow_segments),
        )
        .route("/flows/:flow_id/storage", post(allocate_storage))
        .route(
            "/objects/:object_id",
            get(get_object).head(head_object).delete(delete_object),
        )
        .route(
            "/flow-delete-requests",
            get(list_flow_delete_requests).post(request_flow_deletion),
        )
        .route("/flow-delete-requests/:request_id", get(get_flow_delete_request))
        .with_state(app_state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(auth_state.clone(), auth_middleware)),
        );

    let addr = SocketAddr::from((
        app_state.config.server.host.parse::<std::net::IpAddr>()?,
        app_state.config.server.port,
    ));

    info!("TAMS server listening on {}", addr);
    info!("Service: {} v{}", app_state.config.service.name, app_state.config.service.version);
    info!("Authentication: {}", if app_state.config.auth.require_auth { "enabled" } else { "disabled" });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await?;

    worker_handle.await?;
    info!("TAMS server stopped");
    Ok(())
}

/// Creates every entity table if it doesn't already exist. Idempotent, so
/// it can run on every startup rather than needing a separate migration step.
async fn ensure_tables(store: &MetadataStore) -> Result<(), Box<dyn std::error::Error>> {
    store.create_table(repositories::source::CREATE_TABLE_DDL).await?;
    store.create_table(repositories::flow::CREATE_TABLE_DDL).await?;
    store.create_table(repositories::segment::CREATE_TABLE_DDL).await?;
    store.create_table(repositories::object::CREATE_TABLE_DDL).await?;
    store
        .create_table(repositories::object::CREATE_REFERENCES_TABLE_DDL)
        .await?;
    store
        .create_table(repositories::flow_delete_request::CREATE_TABLE_DDL)
        .await?;
    Ok(())
}

fn init_logging(level: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
    }

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down..."),
        _ = terminate => info!("received SIGTERM, shutting down..."),
    }
    token.cancel();
}
