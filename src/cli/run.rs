use crate::config::parse::load_config;
use crate::config::types::Config;
use crate::feed::client::{FeedClient, FetchError};
use crate::pipeline::{run_writer, PipelineError};
use crate::storage::duckdb::DuckDbStorage;
use crate::storage::traits::{Storage, StorageError};
use crate::stream::reader::{ReaderPacing, StreamError, StreamExit, StreamReader};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("feed client error: {0}")]
    Feed(#[from] FetchError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Shutdown requests for a running stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    None,
    /// Stop after the in-flight fetch completes
    Graceful,
    /// Also close the feed connection, abandoning the in-flight fetch
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: StreamExit,
    pub events_written: usize,
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/alertstream/config.yml");
            eprintln!("  /etc/alertstream/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'alertstream config init' to generate one.");
            std::process::exit(1);
        }
    };

    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(Shutdown::None);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing in-flight fetch");
            shutdown_tx.send_replace(Shutdown::Graceful);
        }
        if signal::ctrl_c().await.is_ok() {
            warn!("Second shutdown signal received, closing feed connection");
            shutdown_tx.send_replace(Shutdown::Immediate);
        }
    });

    let summary = run_stream(config, shutdown_rx).await?;
    info!(
        exit = ?summary.exit,
        events_written = summary.events_written,
        "Alert stream shut down"
    );
    Ok(())
}

/// Run the stream reader against the configured feed, writing every batch
/// to storage, until shutdown is requested or the stream ends on its own.
pub async fn run_stream(
    config: Config,
    mut shutdown_rx: watch::Receiver<Shutdown>,
) -> Result<RunSummary, RunError> {
    info!(path = %config.storage.path.display(), "Initializing storage");
    let storage: Arc<dyn Storage> = Arc::new(DuckDbStorage::new(&config.storage.path)?);
    storage.init_schema().await?;

    let client = FeedClient::new(&config.feed)?;
    info!(url = %client.url(), manager_id = %config.manager.id, "Connecting to alert feed");
    let closer = client.closer();

    let mut reader = StreamReader::new(client, storage.clone(), &config.manager.id)
        .with_pacing(ReaderPacing::from(&config.stream));
    let handle = reader.handle();

    let (batch_tx, batch_rx) = mpsc::channel(config.stream.channel_capacity);
    let writer_handle = tokio::spawn(run_writer(
        batch_rx,
        storage.clone(),
        config.manager.id.clone(),
    ));

    let shutdown_handle = tokio::spawn(async move {
        if shutdown_rx.wait_for(|s| *s != Shutdown::None).await.is_err() {
            return;
        }
        handle.stop();
        if shutdown_rx.wait_for(|s| *s == Shutdown::Immediate).await.is_ok() {
            closer.close();
        }
    });

    reader.start();
    info!("Alert stream started");
    let stream_result = reader.stream_batches(batch_tx).await;
    shutdown_handle.abort();

    let stats = reader.stats();
    info!(
        manager_id = %stats.manager_id,
        cursor = ?stats.cursor,
        "Alert stream loop finished"
    );

    // The sender is gone once stream_batches returns, so the writer drains and exits.
    let written = match writer_handle.await? {
        Ok(written) => written,
        Err(e) => {
            error!(error = %e, "Event writer failed");
            return Err(e.into());
        }
    };

    let exit = match stream_result {
        Ok(exit) => exit,
        Err(e) => {
            error!(error = %e, "Alert stream failed");
            return Err(e.into());
        }
    };

    Ok(RunSummary {
        exit,
        events_written: written,
    })
}
