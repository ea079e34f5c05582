/// Mesa Identity Service Entry Point
///
/// Runs the identity worker:
/// - PostgreSQL connection pool + migrations
/// - Role vocabulary seeding (idempotent)
/// - Outbox dispatcher (background task)
/// - Graceful shutdown on SIGINT
///
/// The auth and tenant orchestrators are the library surface consumed by
/// the transport layer; this binary owns the background side.
use anyhow::{Context, Result};
use mesa_identity::{
    config::Settings,
    services::{auth, outbox},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mesa_identity=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Mesa identity service");

    // Loading fails fast on a missing signing key; token issuance never
    // discovers a configuration hole at request time.
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded");

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    info!(
        max_connections = settings.database.max_connections,
        "Database pool initialized"
    );

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    auth::seed_roles(&db_pool)
        .await
        .context("Failed to seed roles")?;
    info!("Role vocabulary seeded");

    let mut registry = outbox::HandlerRegistry::new();
    registry.register(Arc::new(outbox::RegistrationLogHandler));

    let shutdown = CancellationToken::new();
    let dispatcher = outbox::spawn_dispatcher(
        db_pool.clone(),
        Arc::new(registry),
        settings.outbox.clone(),
        shutdown.clone(),
    );

    info!("Identity service ready");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    shutdown.cancel();
    dispatcher.await.context("Outbox dispatcher panicked")?;

    info!("Identity service stopped");
    Ok(())
}
