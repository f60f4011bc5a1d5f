//! # Armory HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Material and weapon counts
//! - `GET /materials/{id}` - Fetch a material
//! - `GET /materials/{id}/maxQuantity` - Units obtainable from stock plus manufacturing
//! - `GET /materials/{id}/power-level` - Effective material power
//! - `PUT /materials/{id}` - Partial update (name, base_power, qty)
//! - `DELETE /materials/{id}` - Soft delete
//! - `GET /weapons/{id}` - Fetch a weapon, computing its power level if unknown
//! - `GET /weapons/{id}/maxQuantity` - Units obtainable from stock plus manufacturing
//! - `DELETE /weapons/{id}` - Soft delete
//!
//! ## Security Configuration
//!
//! - `[cors] origins` / `ARMORY_CORS_ORIGINS`: allowed origins, or "*" for all (default: localhost only)
//! - `[limits] rate_limit` / `ARMORY_RATE_LIMIT`: requests per second (default: 100, 0 to disable)

pub mod handlers;
pub mod middleware;
pub mod types;

pub use middleware::create_rate_limiter;

use crate::config::{ArmoryConfig, CorsConfig};
use crate::error::AppError;
use armory_core::Armory;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies larger than this are rejected before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the armory.
#[derive(Clone)]
pub struct AppState {
    pub armory: Arc<RwLock<Armory>>,
}

impl AppState {
    /// Create new app state around an armory.
    #[must_use]
    pub fn new(armory: Armory) -> Self {
        Self {
            armory: Arc::new(RwLock::new(armory)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from configuration.
///
/// - `["*"]`: allows all origins
/// - not set: localhost only
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let Some(origins) = cors.origins.as_deref() else {
        tracing::info!("CORS: no origins configured, defaulting to localhost only");
        return build_localhost_cors();
    };

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS: no valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }
    restricted_cors(allowed)
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against DoS (if enabled)
pub fn create_router(state: AppState, config: &ArmoryConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/materials/{id}",
            get(handlers::get_material_handler)
                .put(handlers::update_material_handler)
                .delete(handlers::delete_material_handler),
        )
        .route(
            "/materials/{id}/maxQuantity",
            get(handlers::material_max_quantity_handler),
        )
        .route(
            "/materials/{id}/power-level",
            get(handlers::material_power_level_handler),
        )
        .route(
            "/weapons/{id}",
            get(handlers::get_weapon_handler).delete(handlers::delete_weapon_handler),
        )
        .route(
            "/weapons/{id}/maxQuantity",
            get(handlers::weapon_max_quantity_handler),
        );

    match create_rate_limiter(config.limits.rate_limit) {
        Some(limiter) => {
            tracing::info!(
                "Rate limiting enabled: {} requests/second",
                config.limits.rate_limit
            );
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    // ServiceBuilder applies top to bottom: the first layer is outermost.
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.cors))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(armory: Armory, config: &ArmoryConfig) -> Result<(), AppError> {
    let router = create_router(AppState::new(armory), config);
    let addr = config.server.addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("Armory HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            // Without a handler the server keeps running until killed.
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
