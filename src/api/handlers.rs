//! API Handlers
//!
//! The catch-all mock handler plus the `/_mock` admin endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, Uri},
    Json,
};
use tracing::warn;

use crate::config::Config;
use crate::loader::Loader;
use crate::mock::SharedRouteTable;
use crate::models::{
    HealthResponse, MockArtifact, MockRequest, RouteInfo, RoutesResponse, StatsResponse,
};
use crate::resolver::Resolver;
use crate::scanner::find_data_files;

/// Application state shared across all handlers.
///
/// The loader and route table are the same instances the watcher mutates.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub loader: Arc<Loader>,
    pub routes: SharedRouteTable,
    pub resolver: Arc<Resolver>,
}

impl AppState {
    /// Wires a state from already-built components.
    pub fn new(config: Config, loader: Arc<Loader>, routes: SharedRouteTable) -> Self {
        let resolver = Arc::new(Resolver::new(&config, Arc::clone(&loader), routes.clone()));
        Self {
            config: Arc::new(config),
            loader,
            routes,
            resolver,
        }
    }

    /// Creates a new AppState from configuration, reading the routes file.
    pub async fn from_config(config: Config) -> Self {
        let loader = Arc::new(Loader::new(&config));
        let routes = SharedRouteTable::load(&config.routes_file_path).await;
        Self::new(config, loader, routes)
    }
}

/// Fallback handler: every request not claimed by `/_mock` is resolved
/// against the mock tree.
pub async fn mock_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> MockArtifact {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let request = MockRequest::new(method.as_str(), url).with_body_bytes(&body);
    state.resolver.resolve(&request).await
}

/// Handler for GET /_mock/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /_mock/stats
///
/// Returns module cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.loader.stats().await;
    let capacity = state.loader.capacity().await;
    Json(StatsResponse::new(&stats, capacity))
}

/// Handler for GET /_mock/routes
///
/// Lists the live alias table and the data files currently on disk.
pub async fn routes_handler(State(state): State<AppState>) -> Json<RoutesResponse> {
    let table = state.routes.snapshot().await;
    let routes = table
        .entries()
        .iter()
        .map(|entry| RouteInfo {
            pattern: entry.source.clone(),
            target: entry.target.to_string(),
            wildcard: entry.pattern.is_wildcard(),
        })
        .collect();

    let data_dir = state.config.data_dir();
    let ext = state.config.data_file_ext.as_str();
    let data_files = tokio::task::spawn_blocking(move || find_data_files(&data_dir, ext))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Data file scan failed");
            Vec::new()
        });

    Json(RoutesResponse { routes, data_files })
}
