//! Herald API server binary entrypoint.
//!
//! Serves the HTTP API and, unless disabled, runs the delivery scheduler in
//! the same process. Ctrl+C stops the HTTP server gracefully, then signals the
//! scheduler and waits for its current cycle to finish.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_common::db::{create_pool, run_migrations};
use herald_engine::scheduler::SchedulerLoop;
use herald_engine::service::NotificationService;
use herald_engine::store::{InMemoryNotificationStore, NotificationStore, PgNotificationStore};

use herald_api::routes::create_router;
use herald_api::state::AppState;

/// Notification payloads are small; reject anything larger before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Herald API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Notification store
    let store: Arc<dyn NotificationStore> = match &config.database_url {
        Some(database_url) => {
            let pool =
                create_pool(database_url, config.db_max_connections, config.store_timeout())
                    .await?;
            run_migrations(&pool).await?;
            Arc::new(PgNotificationStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory notification store");
            Arc::new(InMemoryNotificationStore::new())
        }
    };

    // Delivery provider
    let provider = herald_notifier::from_config(&config.delivery, &config.redis_url).await?;

    let service = NotificationService::new(store, provider)
        .with_timeouts(config.dispatch_timeout(), config.store_timeout());

    // Background delivery loop
    let scheduler = if config.scheduler_enabled {
        Some(SchedulerLoop::new(service.clone(), config.scheduler_interval()).start())
    } else {
        tracing::info!("Scheduler disabled, notifications are only delivered on demand");
        None
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));

    // Build application state and router
    let state = AppState::new(service, config);
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        let state = scheduler.shutdown().await;
        tracing::info!(?state, "Scheduler stopped");
    }

    tracing::info!("Herald API server stopped.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("herald_api=debug,herald_engine=debug,herald_notifier=info,tower_http=debug")
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
}
