//! Storefront Backend
//!
//! REST backend for a storefront and its admin panel: SQLite document persistence, image
//! ingestion with an inline fallback, and cursor-paginated listings.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod images;
mod models;
mod pagination;
mod search;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::{DocumentStore, SqliteDocumentStore};
use images::{ImagePipeline, PipelineOptions};
use storage::{LocalObjectStorage, ObjectStorage, UnconfiguredStorage};

/// Request bodies carry base64 images.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub images: Arc<ImagePipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        config: Config,
    ) -> Self {
        let options = PipelineOptions {
            upload_timeout: config.upload_timeout,
            max_width: config.max_image_width,
            jpeg_quality: config.jpeg_quality,
        };
        Self {
            store,
            images: Arc::new(ImagePipeline::new(storage, options)),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Storefront Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if the admin key is not configured
    if config.admin_key.is_none() {
        tracing::warn!("No admin key configured (STOREFRONT_ADMIN_KEY). Admin routes are open!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));

    // Initialize object storage
    let storage: Arc<dyn ObjectStorage> = match &config.media_dir {
        Some(dir) => {
            tracing::info!("Media directory: {:?}", dir);
            tokio::fs::create_dir_all(dir).await?;
            Arc::new(LocalObjectStorage::new(dir.clone(), config.media_base_url.clone()))
        }
        None => {
            tracing::warn!(
                "No media directory configured (STOREFRONT_MEDIA_DIR). Images are stored inline."
            );
            Arc::new(UnconfiguredStorage)
        }
    };

    let bind_addr = config.bind_addr;
    let app = create_router(AppState::new(store, storage, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone the admin key for the auth layer
    let admin_key = state.config.admin_key.clone();

    // Storefront routes
    let public_routes = Router::new()
        .route("/settings", get(api::get_settings))
        .route("/settings/banner/{slot}", get(api::get_banner))
        .route("/reviews", get(api::list_reviews).post(api::create_review))
        .route("/{collection}", get(api::list_records))
        .route("/{collection}/{id}", get(api::get_record));

    // Admin routes
    let admin_routes = Router::new()
        .route("/settings", put(api::update_settings))
        .route("/uploads/article-image", post(api::upload_article_image))
        .route("/{collection}", post(api::create_record))
        .route(
            "/{collection}/{id}",
            put(api::update_record).delete(api::delete_record),
        )
        .route_layer(middleware::from_fn(move |req, next| {
            auth::admin_key_layer(admin_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    let mut app = Router::new()
        .nest("/api", public_routes.merge(admin_routes))
        .merge(health_routes);

    if let Some(dir) = &state.config.media_dir {
        let prefix = state.config.media_base_url.trim_end_matches('/');
        if prefix.starts_with('/') {
            app = app.nest_service(prefix, ServeDir::new(dir));
        }
    }

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
