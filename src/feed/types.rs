use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Response body of one feed request.
///
/// ```json
/// {
///   "generationID": "323e0863-f501-4896-b7dc-353cf863597d",
///   "messages": [
///     {"index": 1, "timestamp": "2017-10-17T08:30:00.466775417Z", "data": {"alerts": [...]}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedBatch {
    #[serde(rename = "generationID")]
    pub generation_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
}

/// One generation-scoped message; messages are ordered by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub data: MessageData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

/// An upstream alert. Fields not modelled here are kept verbatim in `extra`
/// so they reach downstream consumers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub annotations: Map<String, Value>,

    #[serde(default)]
    pub labels: Map<String, Value>,

    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,

    pub status: AlertStatus,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Alert {
    /// Annotation value rendered as text, the way upstream tooling compares it
    pub fn annotation_text(&self, key: &str) -> Option<String> {
        self.annotations.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
