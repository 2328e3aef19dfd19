mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
mod ws;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use std::panic;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use db::store::ClipStore;
use docs::ApiDoc;
use routes::create_api_routes;
use ws::registry::RoomRegistry;

/// Shared state behind every handler
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RoomRegistry>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "clipsync=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Initialize database connection
    let Some(db_url) = config.db_url.clone() else {
        error!("No database URL configured - cannot serve clips");
        std::process::exit(1);
    };
    if let Err(e) = db::dbclip::init_db(&db_url, config.clip_ttl()).await {
        error!("Failed to initialize database: {}", e);
        std::process::exit(1);
    }
    info!("Database initialized successfully");

    let store: Arc<dyn ClipStore> = match db::dbclip::get_db() {
        Some(db) => db,
        None => {
            error!("Database not initialized");
            std::process::exit(1);
        }
    };

    // Sweep rows whose TTL elapsed. Reads and writes already filter on
    // expiry, the sweeper just reclaims the space and the identifiers.
    let sweep_store = store.clone();
    let sweep_every = Duration::from_secs(config.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match sweep_store.delete_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Swept {} expired clips", n),
                Err(e) => error!("Expired clip sweep failed: {}", e),
            }
        }
    });

    // The room registry owns all live sync state
    let registry = Arc::new(RoomRegistry::new(
        store,
        config.debounce(),
        config.max_clip_bytes,
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        registry,
    });

    // CORS for the frontend origin; permissive when none is configured
    let cors = match config.cors_origins.as_deref() {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!("Invalid CORS origin '{}', allowing any origin", origin);
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    // Combine all routes
    let app_routes = Router::new()
        // Mount API routes
        .nest("/api", create_api_routes(app_state.clone()))
        // Mount the sync socket
        .merge(
            Router::new()
                .route("/ws", get(ws::handler::ws_handler))
                .with_state(app_state),
        )
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start the server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("Server running on http://{}", config.server_address());
    info!("Sync socket available at ws://{}/ws", config.server_address());
    info!("Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
