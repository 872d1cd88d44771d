//! [`RequestExecutor`] over `reqwest`.
//!
//! reqwest's own redirect following and cookie store are disabled: both are
//! handled by this crate. One client is kept for direct routes and one per
//! proxy, so connection pooling still applies.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use reqwest::{Client, Proxy, redirect};
use tracing::{debug, instrument};

use super::RequestExecutor;
use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::http::{HttpHost, HttpRequest, HttpResponse, ResponseBody, Route};
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (5 minutes).
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Transport settings.
///
/// # Default Values
///
/// - `connect_timeout`: 30 seconds
/// - `request_timeout`: 300 seconds
/// - `user_agent`: `http-exchange/<version>`
/// - `gzip`: `true`
#[derive(Debug, Clone)]
pub struct TransportConfig {
    connect_timeout: Duration,
    request_timeout: Duration,
    user_agent: String,
    gzip: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
            gzip: true,
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Sends requests with `reqwest`.
#[derive(Debug)]
pub struct ReqwestTransport {
    config: TransportConfig,
    direct: Client,
    proxied: DashMap<HttpHost, Client>,
}

impl ReqwestTransport {
    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Transport`] when the client cannot be built
    /// (e.g. TLS backend initialization failure).
    pub fn new(config: TransportConfig) -> Result<Self, ExchangeError> {
        let direct = build_client(&config, None)?;
        Ok(Self {
            config,
            direct,
            proxied: DashMap::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn client_for(&self, route: &Route) -> Result<Client, ExchangeError> {
        let Some(proxy) = route.proxy_host() else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.get(proxy) {
            return Ok(client.value().clone());
        }
        let client = build_client(&self.config, Some(proxy))?;
        self.proxied.insert(proxy.clone(), client.clone());
        Ok(client)
    }
}

fn build_client(config: &TransportConfig, proxy: Option<&HttpHost>) -> Result<Client, ExchangeError> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .gzip(config.gzip)
        .user_agent(config.user_agent.clone())
        .redirect(redirect::Policy::none())
        .no_proxy();
    let label = match proxy {
        Some(proxy) => {
            let url = format!("{}://{}", proxy.scheme(), proxy.to_host_string());
            let resolved = Proxy::all(&url).map_err(|e| ExchangeError::transport(&url, e))?;
            builder = builder.proxy(resolved);
            url
        }
        None => "direct".to_string(),
    };
    builder
        .build()
        .map_err(|e| ExchangeError::transport(label, e))
}

#[async_trait]
impl RequestExecutor for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(method = %request.method(), uri = %request.uri(), route = %route))]
    async fn execute(
        &self,
        route: &Route,
        request: &HttpRequest,
        _ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        let client = self.client_for(route)?;
        let mut builder = client
            .request(request.method().clone(), request.uri().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExchangeError::transport(request.uri().as_str(), e))?;
        debug!(status = %response.status(), "response received");

        let mut converted = HttpResponse::new(response.status());
        *converted.headers_mut() = response.headers().clone();
        let url = response.url().to_string();
        Ok(converted.with_body(Box::new(ReqwestBody {
            url,
            response: Some(response),
        })))
    }
}

/// Streams a reqwest response body.
struct ReqwestBody {
    url: String,
    response: Option<reqwest::Response>,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn read_to_end(&mut self) -> Result<Vec<u8>, ExchangeError> {
        let Some(response) = self.response.take() else {
            return Ok(Vec::new());
        };
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ExchangeError::transport(&self.url, e))?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn drain(&mut self) -> Result<u64, ExchangeError> {
        let Some(response) = self.response.take() else {
            return Ok(0);
        };
        let mut drained = 0_u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ExchangeError::transport(&self.url, e))?;
            drained += chunk.len() as u64;
        }
        Ok(drained)
    }
}
