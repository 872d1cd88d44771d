//! Exchange-level error type.
//!
//! Only fatal conditions surface here. Cookie parse/validation failures and
//! per-option authentication failures are logged and absorbed by the cookie
//! and auth layers instead.

use thiserror::Error;

use crate::auth::AuthError;

/// Errors that abort an exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The configured cookie policy is not registered.
    #[error("unsupported cookie policy: {policy}")]
    UnsupportedPolicy {
        /// Policy name that failed the registry lookup.
        policy: String,
    },

    /// More redirects than the configured bound.
    #[error("maximum redirects ({max}) exceeded")]
    RedirectLimitExceeded {
        /// The configured bound.
        max: u32,
    },

    /// Redirect location without a usable host.
    #[error("redirect URI does not specify a valid host name: {uri}")]
    InvalidRedirectTarget {
        /// The offending redirect URI.
        uri: String,
    },

    /// Redirect back to an already visited location.
    #[error("circular redirect to '{uri}'")]
    CircularRedirect {
        /// The repeated location.
        uri: String,
    },

    /// The peer violated the protocol (missing `Location`, bad `CONNECT` reply, ...).
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The proxy refused to open a tunnel.
    #[error("CONNECT refused by proxy: HTTP {status}")]
    TunnelRefused {
        /// Final status returned to the `CONNECT` request.
        status: u16,
    },

    /// Authentication could not be performed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transport failure reported by the HTTP client.
    #[error("transport error requesting {url}: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The transport timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// I/O failure while reading or releasing a message.
    #[error("I/O error {context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ExchangeError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unsupported-policy error.
    pub fn unsupported_policy(policy: impl Into<String>) -> Self {
        Self::UnsupportedPolicy {
            policy: policy.into(),
        }
    }

    /// Creates an invalid-redirect-target error.
    pub fn invalid_redirect_target(uri: impl Into<String>) -> Self {
        Self::InvalidRedirectTarget { uri: uri.into() }
    }

    /// Creates a transport error from a reqwest error, mapping timeouts.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Transport { url, source }
        }
    }

    /// Creates an I/O error.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for protocol-level failures.
    ///
    /// After a protocol failure the connection may still be salvaged, so the
    /// redirect driver drains the response before closing it. Transport
    /// failures close the response straight away.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        !matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Io { .. }
        )
    }
}
