//! Remote recording download.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;

use crate::is_transient_status;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Download failed: {0}")]
    Network(String),

    #[error("Download returned HTTP {0}")]
    Status(u16),

    #[error("Recording exceeds {max} bytes")]
    TooLarge { max: u64 },

    #[error("Recording is empty")]
    Empty,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status(status) => is_transient_status(*status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Downloads a recording, refusing anything larger than `max_bytes`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<FetchedMedia, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    http_client: Client,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<FetchedMedia, FetchError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(FetchError::TooLarge { max: max_bytes });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Servers may omit or misstate the length, so enforce the bound while reading.
        let mut data = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            if (data.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::TooLarge { max: max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(FetchError::Empty);
        }

        tracing::debug!(size_bytes = data.len(), "Recording downloaded");
        Ok(FetchedMedia {
            data: data.freeze(),
            content_type,
        })
    }
}
