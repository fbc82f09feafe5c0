use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One event as recorded in the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub manager_id: String,
    /// Source tag, e.g. `DATAWAREHOUSE` for events from the alert feed
    pub source: String,
    pub status: String,
    /// Provenance stamp; only set on normalized alerts
    pub generation_id: Option<String>,
    pub message_index: Option<u64>,
    pub starts_at: Option<DateTime<Utc>>,
    /// Full serialized event payload
    pub full_data: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Append events to the event log, preserving slice order.
    async fn write_events(&self, events: &[StoredEvent]) -> Result<(), StorageError>;

    /// Most recently written event for this manager and source that carries a
    /// generation stamp.
    async fn last_stamped_event(
        &self,
        manager_id: &str,
        source: &str,
    ) -> Result<Option<StoredEvent>, StorageError>;

    /// Most recent events for a manager, newest first.
    async fn recent_events(
        &self,
        manager_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StorageError>;

    async fn collection_problem_started_at(
        &self,
        manager_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Record `at` as the outage start unless one is already recorded.
    /// Returns the effective start time. Read and write happen atomically.
    async fn start_collection_problem(
        &self,
        manager_id: &str,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError>;

    /// Clear the outage start, returning whatever value it held.
    async fn clear_collection_problem(
        &self,
        manager_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}
