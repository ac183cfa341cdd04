//! hotmock - A file-backed mock HTTP server with live reload
//!
//! Serves `{MOCK_DIR}/data/{METHOD}/{path}.json` for every request, optionally
//! transformed by a sibling logic script, and reloads on file changes.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotmock::scanner::find_data_files;
use hotmock::{create_router, AppState, Config, MockWatcher};

/// Main entry point for the mock server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build loader, route table and resolver
/// 4. Start the live-reload watcher
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotmock=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hotmock server");

    let config = Config::from_env()
        .and_then(Config::resolve_paths)
        .context("invalid configuration")?;
    info!(
        mock_dir = %config.mock_dir.display(),
        routes_file = %config.routes_file_path.display(),
        data_ext = %config.data_file_ext,
        logic = config.use_logic_file,
        logic_ext = %config.logic_file_ext,
        dialect = %config.script_dialect,
        cache_capacity = config.cache_capacity,
        port = config.server_port,
        "Configuration loaded"
    );

    let state = AppState::from_config(config.clone()).await;

    let data_dir = config.data_dir();
    let ext = config.data_file_ext.as_str();
    let data_files = tokio::task::spawn_blocking(move || find_data_files(&data_dir, ext)).await?;
    let route_count = state.routes.snapshot().await.len();
    info!(
        data_files = data_files.len(),
        routes = route_count,
        "Mock tree scanned"
    );
    if data_files.is_empty() && route_count == 0 {
        warn!(data_dir = %config.data_dir().display(), "No mock data found");
    }

    let mut watcher = MockWatcher::new(&config, state.loader.clone(), state.routes.clone());
    if config.watch {
        if let Err(e) = watcher.start() {
            warn!(error = %e, "Live reload disabled");
        }
    }

    let loader = state.loader.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    watcher.close();
    loader.clear().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
