//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::ExposeSecret;
use service_core::error::AppError;
use tokio::net::TcpListener;

use crate::config::{StoreBackend, WorkshopConfig};
use crate::pdf::LogoLoader;
use crate::services::{MemoryStore, PgStore, Store, WorkshopService};
use crate::{build_router, AppState};

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Connects the configured store and binds the HTTP listener.
    pub async fn build(config: WorkshopConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    /// Builds around an already constructed store.
    pub async fn build_with_store(
        config: WorkshopConfig,
        store: Arc<dyn Store>,
    ) -> Result<Self, AppError> {
        let state = build_state(config.clone(), store);
        let router = build_router(state.clone());

        // Port 0 binds a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %config.service_name,
            backend = ?config.store.backend,
            "Workshop service: HTTP on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

pub fn build_state(config: WorkshopConfig, store: Arc<dyn Store>) -> AppState {
    let logo_loader = LogoLoader::new(
        Duration::from_secs(config.pdf.logo_timeout_secs),
        config.pdf.default_logo_url.clone(),
    );
    AppState {
        workshop: WorkshopService::new(store, logo_loader),
        config,
    }
}

async fn connect_store(config: &WorkshopConfig) -> Result<Arc<dyn Store>, AppError> {
    match (config.store.backend, &config.store.database) {
        (StoreBackend::Memory, _) => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        (StoreBackend::Postgres, Some(db)) => {
            let store = PgStore::connect(
                db.url.expose_secret(),
                db.max_connections,
                db.min_connections,
            )
            .await?;
            if db.run_migrations {
                store.run_migrations().await?;
            }
            Ok(Arc::new(store))
        }
        (StoreBackend::Postgres, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "DATABASE_URL is required for the postgres store backend"
        ))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
