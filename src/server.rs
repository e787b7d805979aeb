//! Server module for managing HTTP server lifecycle
//!
//! Builds the store for the configured backend, wires the broadcast hub into
//! the application state, and serves until a shutdown signal. On shutdown the
//! hub is closed first so open event streams end and connections can drain.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;

use crate::api::routes::create_router;
use crate::config::{Environment, Settings, StoreBackend};
use crate::db::{AsyncDbPool, establish_async_connection_pool, run_pending_migrations};
use crate::hub::BroadcastHub;
use crate::repositories::{MemoryNotificationStore, PgNotificationStore, SharedNotificationStore};
use crate::state::AppState;

/// HTTP server manager
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start the server and run until shutdown signal
    ///
    /// # Errors
    /// - JWT configuration errors
    /// - Database pool or migration errors (postgres backend)
    /// - Address binding errors
    /// - Server runtime errors
    pub async fn run(self) -> anyhow::Result<()> {
        self.log_configuration();

        self.settings.jwt.validate().map_err(|e| {
            tracing::error!(error = %e, "JWT configuration validation failed");
            anyhow::anyhow!("JWT configuration validation failed: {}", e)
        })?;

        let (store, db_pool) = self.build_store().await?;

        let hub = BroadcastHub::from_config(&self.settings.stream);
        let state = AppState::new(
            store,
            hub.clone(),
            db_pool,
            self.settings.jwt.clone(),
            self.settings.stream.clone(),
        );
        let router = create_router(state).layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(self.settings.server.request_timeout),
        ));

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        tracing::info!(address = %address, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                hub.shutdown();
                tracing::info!("Broadcast hub shut down, closing open streams");
            })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    async fn build_store(&self) -> anyhow::Result<(SharedNotificationStore, Option<AsyncDbPool>)> {
        let database = &self.settings.database;

        match database.backend {
            StoreBackend::Postgres => {
                tracing::info!("Initializing database connection pool...");
                let pool = establish_async_connection_pool(database).await?;
                tracing::info!("Database connection pool initialized");

                if database.auto_migrate {
                    let applied = run_pending_migrations(&database.url).await?;
                    tracing::info!(count = applied.len(), "Applied pending migrations");
                }

                let store: SharedNotificationStore = Arc::new(PgNotificationStore::new(pool.clone()));
                Ok((store, Some(pool)))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory notification store; data is lost on restart");
                let store: SharedNotificationStore = Arc::new(MemoryNotificationStore::new());
                Ok((store, None))
            }
        }
    }

    fn log_configuration(&self) {
        let settings = &self.settings;

        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        tracing::info!(
            host = %settings.server.host,
            port = %settings.server.port,
            request_timeout = %settings.server.request_timeout,
            "Server configuration loaded"
        );

        tracing::info!(
            backend = settings.database.backend.as_str(),
            max_connections = %settings.database.max_connections,
            min_connections = %settings.database.min_connections,
            auto_migrate = %settings.database.auto_migrate,
            "Database configuration loaded"
        );

        tracing::info!(
            subscriber_buffer = %settings.stream.subscriber_buffer,
            keep_alive_interval = %settings.stream.keep_alive_interval,
            "Stream configuration loaded"
        );

        tracing::info!(
            access_token_expiration = %settings.jwt.access_token_expiration,
            secret_configured = %(!settings.jwt.secret.is_empty()),
            "JWT configuration loaded"
        );
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// A signal whose handler cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
