//! Network seam: one attempt, one outbound call.
//!
//! The `SourceFetcher` trait isolates the retry executor from the real
//! network so the whole engine can run against scripted responses in
//! tests. The production implementation builds a fresh `reqwest` client
//! per attempt, since the proxy and user-agent change between attempts.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::pool::{Credential, Proxy};

/// Source-specific request spec built by a strategy for one query.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source label carried into trace events (e.g. "espacenet")
    pub source: &'static str,
    pub url: Url,
    /// Provider group whose credentials this request needs, if any
    pub credential_group: Option<&'static str>,
}

impl FetchRequest {
    pub fn new(source: &'static str, url: Url) -> Self {
        Self {
            source,
            url,
            credential_group: None,
        }
    }

    pub fn with_credential_group(mut self, group: &'static str) -> Self {
        self.credential_group = Some(group);
        self
    }
}

/// Egress parameters chosen by the retry executor for one attempt.
#[derive(Debug, Clone)]
pub struct FetchVia {
    pub proxy: Proxy,
    pub credential: Option<Credential>,
    pub user_agent: String,
}

/// Raw response from one attempt, before classification.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    /// The source served content (as opposed to blocking or rate-limiting).
    pub fn is_served(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One outbound call through a chosen proxy and identity.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, via: &FetchVia) -> FetchResult<FetchResponse>;
}

/// Production fetcher over `reqwest`.
pub struct HttpFetcher {
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            request_timeout,
            connect_timeout,
        }
    }

    fn build_client(&self, via: &FetchVia) -> FetchResult<reqwest::Client> {
        let proxy =
            reqwest::Proxy::all(via.proxy.url().clone()).map_err(|_| FetchError::Proxy {
                url: via.proxy.id().to_string(),
            })?;

        reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(10))
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest, via: &FetchVia) -> FetchResult<FetchResponse> {
        debug!(
            source = request.source,
            url = %request.url,
            proxy_id = %via.proxy.id(),
            "fetch starting"
        );

        let client = self.build_client(via)?;

        let mut builder = client
            .get(request.url.clone())
            .header("User-Agent", &via.user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1");

        if let Some(credential) = &via.credential {
            builder = builder.header("X-Api-Key", credential.key());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: request.url.to_string(),
                }
            } else if e.is_connect() {
                FetchError::Connect(Box::new(e))
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        debug!(
            source = request.source,
            status = status,
            body_length = body.len(),
            "fetch finished"
        );

        Ok(FetchResponse { status, body })
    }
}
