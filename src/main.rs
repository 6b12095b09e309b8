//! RideVault server binary
//!
//! Wires configuration, the database pool, the routing collaborator, and the
//! ride/vault services into one axum application.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use ridevault_server::config::{Config, RoutingProvider};
use ridevault_server::middleware::request_tracing;
use ridevault_server::ride::RideService;
use ridevault_server::routing::{HttpRouteLookup, RouteLookup, StaticRouteLookup};
use ridevault_server::state::AppState;
use ridevault_server::vault::VaultService;
use ridevault_server::{db, routes, websocket};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting RideVault server");

    let db_pool = match db::create_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::run_migrations(&db_pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let routing: Arc<dyn RouteLookup> = match config.routing_provider {
        RoutingProvider::Http => {
            tracing::info!(base_url = %config.routing_base_url, "Using HTTP routing provider");
            Arc::new(HttpRouteLookup::new(
                config.routing_base_url.clone(),
                config.routing_api_key.clone().unwrap_or_default(),
                Duration::from_millis(config.routing_timeout_ms),
            ))
        }
        RoutingProvider::Static => {
            tracing::info!("Using static routing provider");
            Arc::new(StaticRouteLookup::new())
        }
    };

    let ride_service = Arc::new(RideService::new(
        db_pool.clone(),
        routing,
        config.fare.clone(),
    ));
    let vault_service = Arc::new(VaultService::new(db_pool.clone()));
    let ws_state = websocket::WsState::new();

    let app_state = AppState::new(
        ride_service,
        vault_service,
        ws_state,
        config.jwt_secret.clone(),
    );

    let health_db_pool = db_pool.clone();

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_db_pool.clone())))
        .route("/ws", get(websocket::ws_handler))
        .merge(routes::ride_routes())
        .merge(routes::vault_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "RideVault API Server"
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

async fn health_check(pool: sqlx::PgPool) -> axum::Json<HealthResponse> {
    let db_status = match db::check_health(&pool).await {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins.filter(|s| !s.is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
