use crate::storage::traits::{Storage, StorageError};
use std::fmt;
use std::sync::Arc;

/// Source tag under which alert-feed events are recorded
pub const EVENT_SOURCE: &str = "DATAWAREHOUSE";

/// Position of the next message to request from the feed.
///
/// `next_index` only moves forward within a generation. A new generation
/// id from upstream is adopted as-is; index continuity across generations
/// is not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub generation: String,
    pub next_index: u64,
}

impl Cursor {
    pub fn new(generation: impl Into<String>, next_index: u64) -> Self {
        Self {
            generation: generation.into(),
            next_index,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.generation, self.next_index)
    }
}

/// Recovers the last durable cursor from previously recorded events.
pub struct PositionStore {
    storage: Arc<dyn Storage>,
    manager_id: String,
}

impl PositionStore {
    pub fn new(storage: Arc<dyn Storage>, manager_id: impl Into<String>) -> Self {
        Self {
            storage,
            manager_id: manager_id.into(),
        }
    }

    /// Cursor just past the last recorded alert, or a cold-start cursor
    /// (`""`, 0) when nothing has been recorded yet.
    pub async fn last_position(&self) -> Result<Cursor, StorageError> {
        let last_event = self
            .storage
            .last_stamped_event(&self.manager_id, EVENT_SOURCE)
            .await?;

        let cursor = match last_event {
            Some(event) => Cursor {
                generation: event.generation_id.unwrap_or_default(),
                next_index: event.message_index.map(|i| i.saturating_add(1)).unwrap_or(0),
            },
            None => Cursor::default(),
        };

        tracing::debug!(
            manager_id = %self.manager_id,
            generation = %cursor.generation,
            next_index = cursor.next_index,
            "Recovered last position"
        );

        Ok(cursor)
    }
}
