//! API Routes
//!
//! Configures the Axum router: admin endpoints under `/_mock`, everything
//! else falls through to the resolver.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{health_handler, mock_handler, routes_handler, stats_handler, AppState};

/// Prefix reserved for admin endpoints; never resolved as a mock.
pub const ADMIN_PREFIX: &str = "/_mock";

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /_mock/health` - Health check endpoint
/// - `GET /_mock/stats` - Module cache statistics
/// - `GET /_mock/routes` - Route aliases and data files
/// - anything else - Resolved against the mock tree
///
/// # Middleware
/// - CORS: Allows any origin, mocks are called from browser dev servers
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/routes", get(routes_handler));

    Router::new()
        .nest(ADMIN_PREFIX, admin)
        .fallback(mock_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
