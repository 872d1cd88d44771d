//! Target and proxy host identity.

use std::fmt;

use url::Url;

/// Default port for plain HTTP.
pub const HTTP_DEFAULT_PORT: u16 = 80;

/// Default port for HTTPS.
pub const HTTPS_DEFAULT_PORT: u16 = 443;

/// A host an exchange talks to: scheme, lower-cased host name and the
/// explicitly given port (if any).
///
/// Equality is structural, so `http://a.example` and `http://a.example:80`
/// are distinct values. Use [`HttpHost::same_endpoint`] when the default port
/// should be filled in before comparing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpHost {
    scheme: String,
    hostname: String,
    port: Option<u16>,
}

impl HttpHost {
    /// Creates a host. The scheme and host name are lower-cased.
    #[must_use]
    pub fn new(scheme: impl AsRef<str>, hostname: impl AsRef<str>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.as_ref().to_ascii_lowercase(),
            hostname: hostname.as_ref().to_ascii_lowercase(),
            port,
        }
    }

    /// Plain `http` host without an explicit port.
    #[must_use]
    pub fn http(hostname: impl AsRef<str>) -> Self {
        Self::new("http", hostname, None)
    }

    /// Extracts the target host from an absolute URL.
    ///
    /// Returns `None` when the URL has no host (e.g. `mailto:` or `data:`).
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        if host.is_empty() {
            return None;
        }
        Some(Self::new(url.scheme(), host, url.port()))
    }

    /// Returns the scheme (`http`, `https`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the lower-cased host name.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the explicitly configured port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the port, falling back to the scheme default.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| default_port(&self.scheme))
    }

    /// Returns a copy with the scheme default port filled in.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            scheme: self.scheme.clone(),
            hostname: self.hostname.clone(),
            port: Some(self.effective_port()),
        }
    }

    /// Returns true when both hosts name the same scheme, host and effective port.
    #[must_use]
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.hostname == other.hostname
            && self.effective_port() == other.effective_port()
    }

    /// Returns true for `https`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// `host[:port]` form used by `CONNECT` request targets and log lines.
    #[must_use]
    pub fn to_host_string(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.hostname),
            None => self.hostname.clone(),
        }
    }
}

impl fmt::Display for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.to_host_string())
    }
}

fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("https") {
        HTTPS_DEFAULT_PORT
    } else {
        HTTP_DEFAULT_PORT
    }
}
