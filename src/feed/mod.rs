pub mod client;
pub mod types;

pub use client::{AlertFetcher, FeedClient, FeedCloser, FetchError};
pub use types::{Alert, AlertStatus, FeedBatch, Message, MessageData};
