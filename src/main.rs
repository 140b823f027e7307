//! Countdown Sync - named countdown timers kept in sync across sessions
//!
//! This is the main entry point for the countdown-sync server.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::info;

use countdown_sync::{
    api::create_router,
    config::Config,
    services::{MemoryGateway, PersistenceGateway, SnapshotStore},
    state::AppState,
    tasks::reconciler_task,
    utils::shutdown_signal,
};

const TIMERS_TABLE: &str = "timers";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_sync={},tower_http=info", config.log_level()))
        .init();

    let settings = config.sync_settings();
    info!("Starting countdown-sync server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, tick={:?}, persist_every={}, tolerance={}s",
          config.host, config.port, settings.tick_interval, settings.persist_every, settings.tolerance);

    let gateway: Arc<dyn PersistenceGateway> = Arc::new(MemoryGateway::new(TIMERS_TABLE));
    let snapshot = SnapshotStore::new(&config.snapshot);
    let state = Arc::new(AppState::new(Arc::clone(&gateway), snapshot, settings));

    // Subscribe before loading so no change between the two is missed
    let feed = gateway.subscribe(TIMERS_TABLE).await?;
    let loaded = state.load().await;
    info!("Session ready with {} timers", loaded);

    let (stop_reconciler, reconciler_stop_rx) = oneshot::channel();
    let reconciler = tokio::spawn(reconciler_task(Arc::clone(&state), feed, reconciler_stop_rx));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers              - List timers");
    info!("  POST   /timers              - Create a timer");
    info!("  POST   /timers/:id/<action> - start | pause | resume | cancel | reset");
    info!("  PATCH  /timers/:id/name     - Rename a timer");
    info!("  PATCH  /timers/:id/duration - Change a timer's duration");
    info!("  DELETE /timers/:id          - Delete a timer");
    info!("  GET    /events              - Server-sent timer updates");
    info!("  GET    /status              - Session status");
    info!("  GET    /health              - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let _ = stop_reconciler.send(());
    if let Err(e) = reconciler.await {
        tracing::warn!("Reconciler task ended abnormally: {}", e);
    }
    state.stop_all_tickers();

    info!("Server shutdown complete");
    Ok(())
}
