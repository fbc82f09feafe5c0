use crate::config::types::StreamConfig;
use crate::feed::client::{AlertFetcher, FetchError};
use crate::feed::types::FeedBatch;
use crate::storage::traits::{Storage, StorageError};
use crate::stream::alert::{is_relevant, normalize};
use crate::stream::cursor::{Cursor, PositionStore};
use crate::stream::event::{EventBatch, StreamEvent};
use crate::stream::outage::OutageSignals;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Running,
    Stopped,
}

/// Start/stop control for a reader, usable from any task
#[derive(Debug, Clone)]
pub struct StreamHandle {
    state: Arc<watch::Sender<ReaderState>>,
}

impl StreamHandle {
    fn new() -> Self {
        let (state, _) = watch::channel(ReaderState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn start(&self) {
        self.state.send_replace(ReaderState::Running);
    }

    /// Observed at the next iteration boundary; an in-flight fetch completes first.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == ReaderState::Running {
                *state = ReaderState::Stopped;
                true
            } else {
                false
            }
        });
    }

    pub fn state(&self) -> ReaderState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ReaderState::Running
    }

    fn subscribe(&self) -> watch::Receiver<ReaderState> {
        self.state.subscribe()
    }
}

/// Result of one fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Fetch succeeded: the resolved status event followed by relevant alerts
    Delivered(EventBatch),

    /// Fetch failed and will be retried from the same cursor
    Outage { event: StreamEvent, error: String },

    /// The feed connection was closed for good
    Closed,
}

impl FetchOutcome {
    /// The events to hand downstream; `None` once the connection is closed
    pub fn into_batch(self) -> Option<EventBatch> {
        match self {
            FetchOutcome::Delivered(batch) => Some(batch),
            FetchOutcome::Outage { event, .. } => Some(vec![event]),
            FetchOutcome::Closed => None,
        }
    }
}

/// Why `stream_batches` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    Stopped,
    ConnectionClosed,
    ConsumerClosed,
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderPacing {
    /// Wait between successful iterations
    pub poll_interval: Duration,
    /// First wait after a failed fetch; doubles per consecutive failure
    pub retry_interval: Duration,
}

impl Default for ReaderPacing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(5),
        }
    }
}

impl From<&StreamConfig> for ReaderPacing {
    fn from(config: &StreamConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            retry_interval: config.retry_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderStats {
    pub manager_id: String,
    pub state: ReaderState,
    pub cursor: Option<Cursor>,
    pub consecutive_failures: u32,
}

/// Polls the alert feed, tracks the cursor, and turns each fetch into a
/// batch of events.
pub struct StreamReader<F> {
    fetcher: F,
    positions: PositionStore,
    outage: OutageSignals,
    cursor: Option<Cursor>,
    handle: StreamHandle,
    state_rx: watch::Receiver<ReaderState>,
    pacing: ReaderPacing,
    consecutive_failures: u32,
}

impl<F: AlertFetcher> StreamReader<F> {
    pub fn new(fetcher: F, storage: Arc<dyn Storage>, manager_id: &str) -> Self {
        let handle = StreamHandle::new();
        let state_rx = handle.subscribe();

        Self {
            fetcher,
            positions: PositionStore::new(storage.clone(), manager_id),
            outage: OutageSignals::new(storage, manager_id),
            cursor: None,
            handle,
            state_rx,
            pacing: ReaderPacing::default(),
            consecutive_failures: 0,
        }
    }

    pub fn with_pacing(mut self, pacing: ReaderPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn start(&self) {
        self.handle.start();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn state(&self) -> ReaderState {
        self.handle.state()
    }

    /// Cursor in memory; `None` until the first fetch loads it
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            manager_id: self.outage.manager_id().to_string(),
            state: self.state(),
            cursor: self.cursor.clone(),
            consecutive_failures: self.consecutive_failures,
        }
    }

    /// Run one fetch cycle.
    ///
    /// Transport failures become an `Outage` outcome and leave the cursor
    /// untouched. Storage failures (position lookup, outage persistence)
    /// are returned as errors.
    pub async fn fetch_once(&mut self) -> Result<FetchOutcome> {
        let cursor = self.current_cursor().await?;

        info!(
            manager_id = %self.outage.manager_id(),
            generation = %cursor.generation,
            index = cursor.next_index,
            "Fetching alerts"
        );

        let response = match self.fetcher.fetch(&cursor).await.and_then(check_indexes) {
            Ok(response) => response,
            Err(FetchError::Closed) => return Ok(FetchOutcome::Closed),
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    manager_id = %self.outage.manager_id(),
                    cursor = %cursor,
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "Alert feed unreachable"
                );
                let event = self.outage.on_failure_detected().await?;
                return Ok(FetchOutcome::Outage {
                    event: event.into(),
                    error: e.to_string(),
                });
            }
        };
        self.consecutive_failures = 0;

        let mut batch: EventBatch = vec![self.outage.on_fetch_succeeded().await?.into()];

        let cursor = self.cursor.get_or_insert_with(Cursor::default);
        let skipped = apply_response(cursor, response, &mut batch);

        if skipped > 0 {
            info!(
                manager_id = %self.outage.manager_id(),
                skipped,
                "Ignored alerts dropped from batch"
            );
        }
        info!(
            manager_id = %self.outage.manager_id(),
            alert_count = batch.len() - 1,
            skipped,
            generation = %cursor.generation,
            index = cursor.next_index,
            "Fetched new alerts"
        );
        debug!(batch = ?batch, "Alert batch");

        Ok(FetchOutcome::Delivered(batch))
    }

    /// Fetch repeatedly while running, sending one batch per iteration.
    ///
    /// Returns when the reader is stopped, the feed connection is closed,
    /// or the receiver is dropped.
    pub async fn stream_batches(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<StreamExit> {
        loop {
            if !self.handle.is_running() {
                info!(manager_id = %self.outage.manager_id(), "Stream reader stopped");
                return Ok(StreamExit::Stopped);
            }

            let outcome = self.fetch_once().await?;
            let failed = matches!(outcome, FetchOutcome::Outage { .. });

            let batch = match outcome.into_batch() {
                Some(batch) => batch,
                None => {
                    info!(manager_id = %self.outage.manager_id(), "Monitoring connection closed");
                    return Ok(StreamExit::ConnectionClosed);
                }
            };

            if tx.send(batch).await.is_err() {
                info!(manager_id = %self.outage.manager_id(), "Batch consumer went away");
                return Ok(StreamExit::ConsumerClosed);
            }

            let delay = if failed {
                self.retry_delay()
            } else {
                self.pacing.poll_interval
            };
            self.pause(delay).await;
        }
    }

    async fn current_cursor(&mut self) -> Result<Cursor> {
        if let Some(cursor) = &self.cursor {
            return Ok(cursor.clone());
        }

        let cursor = self.positions.last_position().await?;
        info!(
            manager_id = %self.outage.manager_id(),
            generation = %cursor.generation,
            index = cursor.next_index,
            "Loaded stream position"
        );
        self.cursor = Some(cursor.clone());
        Ok(cursor)
    }

    fn retry_delay(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(16);
        self.pacing
            .retry_interval
            .saturating_mul(1u32 << exponent)
            .min(MAX_RETRY_INTERVAL)
    }

    /// Sleep, waking early if the reader leaves the running state
    async fn pause(&mut self, delay: Duration) {
        if delay.is_zero() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.state_rx.wait_for(|state| *state != ReaderState::Running) => {}
        }
    }
}

/// Rejects a response whose message indexes cannot advance the cursor, so
/// it is retried as an outage instead of wrapping the cursor around.
fn check_indexes(response: FeedBatch) -> std::result::Result<FeedBatch, FetchError> {
    match response
        .messages
        .iter()
        .find(|message| message.index.checked_add(1).is_none())
    {
        Some(message) => Err(FetchError::IndexOverflow(message.index)),
        None => Ok(response),
    }
}

/// Apply a successful response to the cursor, appending relevant alerts to
/// `batch`. Returns the number of alerts dropped by the relevance filter.
fn apply_response(cursor: &mut Cursor, response: FeedBatch, batch: &mut EventBatch) -> usize {
    cursor.generation = response.generation_id;

    let mut skipped = 0;
    for message in response.messages {
        cursor.next_index = message.index;

        let mut message_skipped = 0;
        for alert in message.data.alerts {
            if is_relevant(&alert) {
                batch.push(normalize(alert, &cursor.generation, message.index).into());
            } else {
                message_skipped += 1;
            }
        }
        if message_skipped > 0 {
            debug!(
                generation = %cursor.generation,
                index = message.index,
                skipped = message_skipped,
                "Skipped alerts marked to be ignored"
            );
        }
        skipped += message_skipped;

        // Indexes were checked to have a successor
        cursor.next_index = message.index.saturating_add(1);
    }

    skipped
}
