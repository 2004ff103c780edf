//! Cached-page invalidation.
//!
//! Profile data is rendered into a cached page by the frontend; once a
//! profile update commits, the service asks the frontend to rebuild it.
//! A webhook failure fails the update as a whole, even though the row is
//! already committed.

use async_trait::async_trait;
use tracing::debug;

use crate::error::CacheError;

/// Invalidate a cached page so the next request re-renders it.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, path: &str) -> Result<(), CacheError>;
}

/// Calls the frontend's revalidation webhook.
pub struct RevalidateClient {
    endpoint: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl RevalidateClient {
    pub fn new(endpoint: String, secret: Option<String>) -> Self {
        Self {
            endpoint,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CacheInvalidator for RevalidateClient {
    async fn invalidate(&self, path: &str) -> Result<(), CacheError> {
        let body = serde_json::json!({
            "path": path,
            "secret": self.secret,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(CacheError::Rejected {
                status: response.status().as_u16(),
            });
        }

        debug!(path = %path, "cached page invalidated");
        Ok(())
    }
}

/// Does nothing; used when no revalidation webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _path: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
