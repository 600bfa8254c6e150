use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::app::{Result, RiftError};
use crate::fetcher::{default_user_agent, FetchResponse, Fetcher};

/// Headers and limits applied to every request made by one [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub user_agent: String,
    pub accept_language: Option<String>,
    pub accept: Option<String>,
    pub timeout: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent().to_string(),
            accept_language: None,
            accept: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetcherOptions {
    /// Accept-Language for a Riot locale such as `en-us`: `en-US,en;q=0.9`.
    pub fn accept_language_for(locale: &str) -> String {
        match locale.split_once('-') {
            Some((lang, region)) => {
                format!("{}-{},{};q=0.9", lang, region.to_uppercase(), lang)
            }
            None => locale.to_string(),
        }
    }
}

/// reqwest-backed fetcher. The client is built on first use and dropped by
/// [`Fetcher::close`].
pub struct HttpFetcher {
    options: FetcherOptions,
    client: Mutex<Option<Client>>,
}

impl HttpFetcher {
    pub fn new(options: FetcherOptions) -> Self {
        Self {
            options,
            client: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &FetcherOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.client.lock().is_some()
    }

    fn client(&self) -> Result<Client> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut headers = HeaderMap::new();
        if let Some(lang) = &self.options.accept_language {
            if let Ok(value) = HeaderValue::from_str(lang) {
                headers.insert(ACCEPT_LANGUAGE, value);
            }
        }
        if let Some(accept) = &self.options.accept {
            if let Ok(value) = HeaderValue::from_str(accept) {
                headers.insert(ACCEPT, value);
            }
        }

        let client = Client::builder()
            .timeout(self.options.timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(self.options.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        *guard = Some(client.clone());
        Ok(client)
    }

    async fn send(&self, url: &str, accept_language: Option<&str>) -> Result<FetchResponse> {
        let client = self.client()?;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                RiftError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RiftError::Http(e)
            }
        };

        let mut request = client.get(url);
        if let Some(value) = accept_language.and_then(|lang| HeaderValue::from_str(lang).ok()) {
            request = request.header(ACCEPT_LANGUAGE, value);
        }

        let response = request.send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_err)?.to_vec();

        Ok(FetchResponse { status, body })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(FetcherOptions::default())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.send(url, None).await
    }

    async fn fetch_localized(&self, url: &str, accept_language: &str) -> Result<FetchResponse> {
        self.send(url, Some(accept_language)).await
    }

    async fn close(&self) {
        self.client.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_language_for_locale() {
        assert_eq!(FetcherOptions::accept_language_for("en-us"), "en-US,en;q=0.9");
        assert_eq!(FetcherOptions::accept_language_for("ko-kr"), "ko-KR,ko;q=0.9");
        assert_eq!(FetcherOptions::accept_language_for("fr"), "fr");
    }

    #[test]
    fn test_client_is_lazy_and_recreated_after_close() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fetcher = HttpFetcher::default();
        assert!(!fetcher.is_open());

        fetcher.client().unwrap();
        assert!(fetcher.is_open());

        rt.block_on(fetcher.close());
        assert!(!fetcher.is_open());

        fetcher.client().unwrap();
        assert!(fetcher.is_open());
    }

    #[test]
    fn test_default_options_use_transparent_user_agent() {
        let options = FetcherOptions::default();
        assert!(options.user_agent.contains("RiftFeed"));
        assert_eq!(options.timeout, Duration::from_secs(30));
    }
}
