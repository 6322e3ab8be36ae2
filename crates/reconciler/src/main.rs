//! Reconciler entry point.
//!
//! Reads delivery claims as JSON lines from stdin and writes one response
//! per claim to stdout.

use entity_store::{EntityStore, InMemoryEntityStore};
use reconciler::config::Config;
use reconciler::{Result, Summary};
use reconciliation::ReconciliationService;
use tokio::io::BufReader;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, stopping");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, stopping");
        }
    }
}

/// Processes stdin until it ends or a shutdown signal arrives.
///
/// A claim in flight when the signal arrives is dropped, which rolls its
/// transaction back.
async fn process_stdin<S: EntityStore>(store: S) -> Result<Option<Summary>> {
    let service = ReconciliationService::new(store);
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        summary = reconciler::run(&service, stdin, stdout) => summary.map(Some),
        () = shutdown_signal() => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    reconciler::init_tracing(&config);

    // 2. Install Prometheus exporter if requested
    reconciler::init_metrics(&config)?;

    // 3. Select the store and process claims
    let summary = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!(max_connections = config.max_connections, "using PostgreSQL store");
            let store = reconciler::connect_postgres(url, &config).await?;
            process_stdin(store).await?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using an empty in-memory store");
            process_stdin(InMemoryEntityStore::new()).await?
        }
    };

    match summary {
        Some(summary) => tracing::info!(
            processed = summary.processed,
            reconciled = summary.reconciled,
            rejected = summary.rejected,
            "reconciler finished"
        ),
        None => tracing::info!("reconciler interrupted"),
    }

    Ok(())
}
