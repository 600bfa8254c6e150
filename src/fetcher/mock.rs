//! In-memory fetcher for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::app::{Result, RiftError};
use crate::fetcher::{FetchResponse, Fetcher};

#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
    languages: Mutex<Vec<(String, Option<String>)>>,
    closes: AtomicUsize,
    delay: Option<Duration>,
    fail_all: bool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch fails with a transport-like error.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses
            .lock()
            .insert(url.to_string(), (status, body.into()));
        self
    }

    pub fn set(&self, url: &str, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .insert(url.to_string(), (status, body.into()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }

    /// `Accept-Language` sent with the most recent request to `url`; `None`
    /// when that request used the fetcher's default.
    pub fn accept_language_for(&self, url: &str) -> Option<String> {
        self.languages
            .lock()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .and_then(|(_, lang)| lang.clone())
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl MockFetcher {
    async fn respond_to(&self, url: &str, accept_language: Option<&str>) -> Result<FetchResponse> {
        self.calls.lock().push(url.to_string());
        self.languages
            .lock()
            .push((url.to_string(), accept_language.map(String::from)));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all {
            return Err(RiftError::Timeout {
                url: url.to_string(),
            });
        }

        let (status, body) = self
            .responses
            .lock()
            .get(url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(FetchResponse {
            status,
            body: body.into_bytes(),
        })
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.respond_to(url, None).await
    }

    async fn fetch_localized(&self, url: &str, accept_language: &str) -> Result<FetchResponse> {
        self.respond_to(url, Some(accept_language)).await
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
