use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod core;
mod middleware;
mod models;

use crate::api::AppState;
use crate::core::{
    auth::AuthManager,
    config::{Settings, StorageBackend},
    images::{ImageManager, ImageStore, InMemoryImageStore, S3ImageStore},
    lane_manager::LaneManager,
    storage::{InMemoryStore, PgStore, Store},
    users::UserManager,
};

/// Where the in-memory image backend claims objects live.
const MEMORY_IMAGE_BASE: &str = "memory://lane-images/";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new().context("failed to load configuration")?;

    init_tracing(&settings);

    info!(
        "Starting Memory Lane API on {}:{}",
        settings.server.host, settings.server.port
    );

    let app = create_app(&settings).await?;

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port))
            .await?;

    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    if settings.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn create_app(settings: &Settings) -> Result<Router> {
    use crate::middleware::{error_handler, request_id};
    use axum::middleware;

    let store: Arc<dyn Store> = match &settings.database.url {
        Some(url) => Arc::new(PgStore::connect(url, &settings.database).await?),
        None => {
            warn!("database.url is not set, rows are kept in memory and lost on exit");
            Arc::new(InMemoryStore::new())
        },
    };

    let image_store: Arc<dyn ImageStore> = match settings.storage.backend {
        StorageBackend::S3 => Arc::new(S3ImageStore::new(&settings.storage)?),
        StorageBackend::Memory => {
            warn!("Using the in-memory image backend, uploads are lost on exit");
            let base = settings
                .storage
                .public_base_url
                .as_deref()
                .unwrap_or(MEMORY_IMAGE_BASE);
            Arc::new(InMemoryImageStore::new(base))
        },
    };

    let images = Arc::new(ImageManager::new(
        image_store,
        settings.storage.max_upload_bytes,
    ));

    let state = AppState {
        lanes: Arc::new(LaneManager::new(
            store.clone(),
            images.clone(),
            settings.site.clone(),
        )),
        users: Arc::new(UserManager::new(store.clone())),
        images,
        auth: Arc::new(AuthManager::new(&settings.auth)),
        store,
    };

    // Outermost first.
    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(CorsLayer::permissive())
            .layer(middleware::from_fn(request_id::add_request_id))
            .layer(TraceLayer::new_for_http().make_span_with(request_id::request_span))
            .layer(CatchPanicLayer::custom(error_handler::handle_panic))
            .layer(middleware::from_fn(error_handler::handle_errors)),
    );

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
