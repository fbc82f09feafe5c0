use crate::feed::types::{Alert, AlertStatus};
use crate::storage::traits::{StorageError, StoredEvent};
use crate::stream::cursor::EVENT_SOURCE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifies the synthetic "event collection problem" alert class
pub const COLLECTION_PROBLEM_UUID: &str = "bde8a18c-913c-4b15-ba55-a1ca49b6674f";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAnnotations {
    pub url: String,
    pub severity: String,
    #[serde(rename = "miqTarget")]
    pub miq_target: String,
    pub message: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
}

impl Default for StatusAnnotations {
    fn default() -> Self {
        Self {
            url: "www.example.com".to_string(),
            severity: "error".to_string(),
            miq_target: "ExtManagementSystem".to_string(),
            message: "Event Collection Problem".to_string(),
            uuid: COLLECTION_PROBLEM_UUID.to_string(),
        }
    }
}

/// Locally generated collector health event: `firing` while the feed is
/// unreachable, `resolved` on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub annotations: StatusAnnotations,
    pub labels: Map<String, Value>,
    pub starts_at: Option<DateTime<Utc>>,
    pub status: AlertStatus,
}

impl StatusEvent {
    pub fn firing(starts_at: DateTime<Utc>) -> Self {
        Self::with_status(AlertStatus::Firing, Some(starts_at))
    }

    /// `starts_at` is the start of the outage that just ended, if any
    pub fn resolved(starts_at: Option<DateTime<Utc>>) -> Self {
        Self::with_status(AlertStatus::Resolved, starts_at)
    }

    fn with_status(status: AlertStatus, starts_at: Option<DateTime<Utc>>) -> Self {
        Self {
            annotations: StatusAnnotations::default(),
            labels: Map::new(),
            starts_at,
            status,
        }
    }
}

/// An upstream alert stamped with the generation and message index it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    #[serde(flatten)]
    pub alert: Alert,

    #[serde(rename = "generationID")]
    pub generation_id: String,

    pub index: u64,
}

/// One entry of a delivered batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Status(StatusEvent),
    Alert(NormalizedEvent),
}

pub type EventBatch = Vec<StreamEvent>;

impl StreamEvent {
    pub fn status(&self) -> AlertStatus {
        match self {
            StreamEvent::Status(event) => event.status,
            StreamEvent::Alert(event) => event.alert.status,
        }
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        match self {
            StreamEvent::Status(event) => event.starts_at,
            StreamEvent::Alert(event) => event.alert.starts_at,
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, StreamEvent::Status(_))
    }

    /// `(generation, index)` for normalized alerts
    pub fn stamp(&self) -> Option<(&str, u64)> {
        match self {
            StreamEvent::Status(_) => None,
            StreamEvent::Alert(event) => Some((event.generation_id.as_str(), event.index)),
        }
    }

    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Event log row for this event, attributed to `manager_id`
    pub fn to_stored(&self, manager_id: &str) -> Result<StoredEvent, StorageError> {
        let (generation_id, message_index) = match self.stamp() {
            Some((generation, index)) => (Some(generation.to_string()), Some(index)),
            None => (None, None),
        };

        Ok(StoredEvent {
            event_id: Uuid::new_v4(),
            manager_id: manager_id.to_string(),
            source: EVENT_SOURCE.to_string(),
            status: self.status().as_str().to_string(),
            generation_id,
            message_index,
            starts_at: self.starts_at(),
            full_data: self.to_payload()?,
            ingested_at: Utc::now(),
        })
    }
}

impl From<StatusEvent> for StreamEvent {
    fn from(event: StatusEvent) -> Self {
        StreamEvent::Status(event)
    }
}

impl From<NormalizedEvent> for StreamEvent {
    fn from(event: NormalizedEvent) -> Self {
        StreamEvent::Alert(event)
    }
}
