use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub manager: ManagerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    pub storage: StorageConfig,
}

/// Connection settings for the upstream alert feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// The manager whose events and outage state this reader owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            retry_interval: default_retry_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}
