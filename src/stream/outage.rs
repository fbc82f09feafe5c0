use crate::storage::traits::{Storage, StorageError};
use crate::stream::event::StatusEvent;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Produces the synthetic collector health events and keeps the outage
/// start time on the owning manager record.
///
/// The start time is persisted rather than held in memory so an outage
/// spanning a restart keeps its original start.
pub struct OutageSignals {
    storage: Arc<dyn Storage>,
    manager_id: String,
}

impl OutageSignals {
    pub fn new(storage: Arc<dyn Storage>, manager_id: impl Into<String>) -> Self {
        Self {
            storage,
            manager_id: manager_id.into(),
        }
    }

    pub fn manager_id(&self) -> &str {
        &self.manager_id
    }

    /// Firing event for a failed fetch. Consecutive failures keep the first
    /// failure's start time.
    pub async fn on_failure_detected(&self) -> Result<StatusEvent, StorageError> {
        self.on_failure_detected_at(Utc::now()).await
    }

    pub async fn on_failure_detected_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<StatusEvent, StorageError> {
        let started_at = self
            .storage
            .start_collection_problem(&self.manager_id, now)
            .await?;

        tracing::debug!(
            manager_id = %self.manager_id,
            started_at = %started_at,
            "Event collection problem recorded"
        );

        Ok(StatusEvent::firing(started_at))
    }

    /// Resolved event for a successful fetch, emitted on every success.
    /// Carries the start of the outage it ends, if one was in progress.
    pub async fn on_fetch_succeeded(&self) -> Result<StatusEvent, StorageError> {
        let started_at = self
            .storage
            .clear_collection_problem(&self.manager_id)
            .await?;

        if let Some(started_at) = started_at {
            tracing::info!(
                manager_id = %self.manager_id,
                started_at = %started_at,
                "Event collection recovered"
            );
        }

        Ok(StatusEvent::resolved(started_at))
    }
}
