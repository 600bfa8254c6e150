pub mod http_fetcher;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::app::{Result, RiftError};

pub use http_fetcher::{FetcherOptions, HttpFetcher};
pub use user_agent::{default_user_agent, random_user_agent};

/// Raw upstream response. Non-2xx statuses are returned, not raised, so
/// callers that care about specific codes (robots.txt 404) can inspect them.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`RiftError::HttpStatus`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RiftError::HttpStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;

    /// Like [`fetch`](Self::fetch), with an `Accept-Language` for this request
    /// replacing the fetcher's own.
    async fn fetch_localized(&self, url: &str, accept_language: &str) -> Result<FetchResponse>;

    /// Release pooled connections. The next fetch reopens them.
    async fn close(&self) {}
}
