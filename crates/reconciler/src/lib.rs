//! Reconciler process: configuration, observability setup and the
//! JSON-lines driver that feeds delivery claims to the reconciliation
//! service.

pub mod config;
pub mod driver;
pub mod error;

use config::{Config, LogFormat};
use entity_store::PostgresEntityStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use driver::{Response, Summary, run};
pub use error::{ReconcilerError, Result};

/// Installs the global tracing subscriber.
///
/// Logs go to stderr; stdout carries the response stream.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Starts the Prometheus exporter when a listener address is configured.
pub fn init_metrics(config: &Config) -> Result<()> {
    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }
    Ok(())
}

/// Connects to PostgreSQL and applies migrations if configured to.
pub async fn connect_postgres(database_url: &str, config: &Config) -> Result<PostgresEntityStore> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await?;
    let store = PostgresEntityStore::new(pool);

    if config.run_migrations {
        store.run_migrations().await?;
        tracing::info!("database migrations applied");
    }

    Ok(store)
}
