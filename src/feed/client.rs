use crate::config::types::FeedConfig;
use crate::feed::types::FeedBatch;
use crate::stream::cursor::Cursor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body decoding failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned error status {status}: {message}")]
    Status { status: u16, message: String },

    /// A message index with no room for a following cursor position
    #[error("feed message index {0} cannot be advanced past")]
    IndexOverflow(u64),

    #[error("feed connection closed")]
    Closed,
}

impl FetchError {
    /// Closure is permanent; everything else is worth retrying.
    pub fn is_closed(&self) -> bool {
        matches!(self, FetchError::Closed)
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Issues one request against the alert feed for a cursor.
#[async_trait]
pub trait AlertFetcher: Send + Sync {
    async fn fetch(&self, cursor: &Cursor) -> Result<FeedBatch>;
}

#[async_trait]
impl<T: AlertFetcher + ?Sized> AlertFetcher for Arc<T> {
    async fn fetch(&self, cursor: &Cursor) -> Result<FeedBatch> {
        (**self).fetch(cursor).await
    }
}

/// HTTP client for the alert feed
#[derive(Debug)]
pub struct FeedClient {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
    closed: CancellationToken,
}

/// Closes a feed connection from another task
#[derive(Debug, Clone)]
pub struct FeedCloser(CancellationToken);

impl FeedCloser {
    pub fn close(&self) {
        self.0.cancel();
    }
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            token: config.token.clone(),
            client,
            closed: CancellationToken::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handle that permanently closes the connection. In-flight and later
    /// fetches report `FetchError::Closed`.
    pub fn closer(&self) -> FeedCloser {
        FeedCloser(self.closed.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    async fn request_batch(&self, cursor: &Cursor) -> Result<FeedBatch> {
        let from_index = cursor.next_index.to_string();
        let mut request = self.client.get(&self.url).query(&[
            ("generationID", cursor.generation.as_str()),
            ("fromIndex", from_index.as_str()),
        ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let batch = response.json().await?;
        Ok(batch)
    }
}

#[async_trait]
impl AlertFetcher for FeedClient {
    async fn fetch(&self, cursor: &Cursor) -> Result<FeedBatch> {
        if self.is_closed() {
            return Err(FetchError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(FetchError::Closed),
            result = self.request_batch(cursor) => result,
        }
    }
}
