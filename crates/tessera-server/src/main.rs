//! Tessera Server: Application entry point.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tessera_auth::{AuthConfig, AuthService};
use tessera_core::repository::{RefreshTokenRepository, UserRepository};
use tessera_db::DbManager;
use tessera_db::repository::{
    MemoryRefreshTokenRepository, MemoryUserRepository, SurrealRefreshTokenRepository,
    SurrealUserRepository,
};
use tessera_server::routes;
use tessera_server::settings::{Settings, StorageBackend};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tessera=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Tessera server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let settings = Settings::load()?;
    info!(environment = %settings.environment, "Starting Tessera server...");

    if settings.uses_dev_secret() {
        warn!("Using the built-in development JWT secret; set TESSERA_AUTH__JWT_SECRET");
    }
    let auth_config = settings.auth_config()?;

    match settings.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            serve(
                &settings,
                MemoryUserRepository::new(),
                MemoryRefreshTokenRepository::new(),
                auth_config,
            )
            .await
        }
        StorageBackend::Surrealdb => {
            let db = DbManager::connect(&settings.db_config()).await?;
            tessera_db::run_migrations(db.client()).await?;
            serve(
                &settings,
                SurrealUserRepository::new(db.client().clone()),
                SurrealRefreshTokenRepository::new(db.client().clone()),
                auth_config,
            )
            .await
        }
    }
}

async fn serve<U, R>(
    settings: &Settings,
    users: U,
    tokens: R,
    config: AuthConfig,
) -> Result<(), BoxError>
where
    U: UserRepository + 'static,
    R: RefreshTokenRepository + 'static,
{
    let auth = Arc::new(AuthService::new(users, tokens, config)?);
    let purger = tokio::spawn(purge_loop(Arc::clone(&auth)));

    let listener = TcpListener::bind(settings.bind_address()).await?;
    info!(address = %settings.bind_address(), "Listening");

    axum::serve(listener, routes::router(auth))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purger.abort();
    info!("Tessera server stopped.");
    Ok(())
}

/// Periodically drop refresh token records that expired unused.
async fn purge_loop<U, R>(auth: Arc<AuthService<U, R>>)
where
    U: UserRepository,
    R: RefreshTokenRepository,
{
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = auth.purge_expired_refresh_tokens().await {
            warn!(error = %e, "Refresh token purge failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
