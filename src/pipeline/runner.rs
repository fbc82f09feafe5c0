use crate::storage::traits::{Storage, StorageError, StoredEvent};
use crate::stream::event::EventBatch;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Errors that can occur during pipeline operation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Run the event writer task.
///
/// Appends every received batch to the event log in one write, in arrival
/// order. Returns the number of events written once the channel closes.
/// A failed write ends the task; dropping the receiver stops the reader.
pub async fn run_writer(
    mut input: mpsc::Receiver<EventBatch>,
    storage: Arc<dyn Storage>,
    manager_id: String,
) -> Result<usize, PipelineError> {
    let mut written = 0usize;

    info!(manager_id = %manager_id, "Event writer started");

    while let Some(batch) = input.recv().await {
        let events = batch
            .iter()
            .map(|event| event.to_stored(&manager_id))
            .collect::<Result<Vec<StoredEvent>, StorageError>>()?;

        if let Err(e) = storage.write_events(&events).await {
            error!(manager_id = %manager_id, error = %e, "Failed to write event batch");
            return Err(e.into());
        }

        written += events.len();
        debug!(
            manager_id = %manager_id,
            count = events.len(),
            total = written,
            "Wrote event batch"
        );
    }

    info!(manager_id = %manager_id, total = written, "Event writer finished");
    Ok(written)
}
