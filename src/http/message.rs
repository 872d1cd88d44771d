//! Request and response values passed through an exchange.
//!
//! These are deliberately thin: headers reuse `reqwest`'s `HeaderMap`, and the
//! response body is an opaque [`ResponseBody`] owned by the transport.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

use super::HttpHost;
use crate::error::ExchangeError;

/// An outgoing request.
#[derive(Clone)]
pub struct HttpRequest {
    method: Method,
    uri: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, uri: Url) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub fn get(uri: Url) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a `CONNECT` request for tunnelling to `target`.
    ///
    /// The URI carries the target authority with its effective port.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the host cannot form a URL.
    pub fn connect(target: &HttpHost) -> Result<Self, url::ParseError> {
        let normalized = target.normalized();
        let uri = Url::parse(&format!(
            "{}://{}/",
            normalized.scheme(),
            normalized.to_host_string()
        ))?;
        Ok(Self::new(Method::CONNECT, uri))
    }

    /// Builder-style header append.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Builder-style body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Path component of the URI (`/` for origin-only URIs).
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query, as sent on the request line.
    #[must_use]
    pub fn request_target(&self) -> String {
        if self.method == Method::CONNECT {
            let port = self.uri.port_or_known_default().unwrap_or(0);
            return format!("{}:{port}", self.uri.host_str().unwrap_or_default());
        }
        match self.uri.query() {
            Some(query) => format!("{}?{query}", self.uri.path()),
            None => self.uri.path().to_string(),
        }
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Appends a header, keeping existing values with the same name.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Replaces all headers.
    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    /// Returns true when at least one header with this name is present.
    #[must_use]
    pub fn contains_header(&self, name: &HeaderName) -> bool {
        self.headers.contains_key(name)
    }

    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Removes and returns the body.
    pub fn take_body(&mut self) -> Option<Vec<u8>> {
        self.body.take()
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("uri", &self.uri.as_str())
            .field("headers", &self.headers.len())
            .field("body", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

/// Streaming response body owned by the transport.
///
/// Draining a body returns the underlying connection to the transport for
/// reuse; dropping it without draining closes the connection.
#[async_trait]
pub trait ResponseBody: Send {
    /// Reads everything that is left.
    async fn read_to_end(&mut self) -> Result<Vec<u8>, ExchangeError>;

    /// Discards everything that is left, returning the number of bytes dropped.
    async fn drain(&mut self) -> Result<u64, ExchangeError> {
        let remaining = self.read_to_end().await?;
        Ok(remaining.len() as u64)
    }
}

/// Fully buffered body.
#[derive(Debug, Clone, Default)]
pub struct BufferedBody {
    bytes: Option<Vec<u8>>,
}

impl BufferedBody {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Some(bytes.into()),
        }
    }
}

#[async_trait]
impl ResponseBody for BufferedBody {
    async fn read_to_end(&mut self) -> Result<Vec<u8>, ExchangeError> {
        Ok(self.bytes.take().unwrap_or_default())
    }
}

/// A response received for one physical attempt.
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Box<dyn ResponseBody>>,
}

impl HttpResponse {
    /// Creates a response without headers or body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Builder-style header append.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Builder-style body.
    #[must_use]
    pub fn with_body(mut self, body: Box<dyn ResponseBody>) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of `name` as a string, if present and valid.
    #[must_use]
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns true while an unconsumed body is attached.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Drains and releases the body so the connection can be reused.
    ///
    /// # Errors
    ///
    /// Propagates the transport error raised while reading.
    pub async fn consume_body(&mut self) -> Result<(), ExchangeError> {
        if let Some(mut body) = self.body.take() {
            body.drain().await?;
        }
        Ok(())
    }

    /// Drops the body without reading it.
    pub fn close(&mut self) {
        self.body = None;
    }

    /// Reads the remaining body.
    ///
    /// # Errors
    ///
    /// Propagates the transport error raised while reading.
    pub async fn bytes(&mut self) -> Result<Vec<u8>, ExchangeError> {
        match self.body.take() {
            Some(mut body) => body.read_to_end().await,
            None => Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target_includes_query() {
        let request = HttpRequest::get(Url::parse("http://a.example/x/y?q=1").unwrap());
        assert_eq!(request.request_target(), "/x/y?q=1");
        assert_eq!(request.path(), "/x/y");
    }

    #[test]
    fn test_connect_request_targets_authority_with_port() {
        let request = HttpRequest::connect(&HttpHost::new("https", "b.example", None)).unwrap();
        assert_eq!(request.method(), Method::CONNECT);
        assert_eq!(request.request_target(), "b.example:443");
    }

    #[tokio::test]
    async fn test_consume_body_releases_body() {
        let mut response =
            HttpResponse::new(StatusCode::OK).with_body(Box::new(BufferedBody::new("abc")));
        assert!(response.has_body());
        response.consume_body().await.unwrap();
        assert!(!response.has_body());
        assert!(response.bytes().await.unwrap().is_empty());
    }
}
