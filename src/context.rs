//! Per-exchange state and request configuration.
//!
//! An [`ExchangeContext`] lives for one logical exchange: the initial request
//! plus every redirect and authentication round it triggers. Fields are
//! public so the negotiator can borrow one auth state mutably while reading
//! the configuration.

use std::sync::Arc;

use url::Url;

use crate::auth::AuthState;
use crate::cookie::{CookieOrigin, CookieSpec};
use crate::http::{HttpHost, Route};

/// Default bound on followed redirects.
pub const DEFAULT_MAX_REDIRECTS: u32 = 50;

/// Default bound on physical requests answering challenges within one round.
pub const DEFAULT_MAX_AUTH_ROUNDS: u32 = 10;

/// Per-request behaviour switches.
///
/// # Default Values
///
/// - `cookie_spec`: `None` (the cookie agent's default policy applies)
/// - `redirects_enabled`: `true`
/// - `max_redirects`: 50
/// - `relative_redirects_allowed`: `true`
/// - `circular_redirects_allowed`: `false`
/// - `authentication_enabled`: `true`
/// - `max_auth_rounds`: 10
/// - preferred auth schemes: `None` (strategy default order)
#[derive(Debug, Clone)]
pub struct RequestConfig {
    cookie_spec: Option<String>,
    redirects_enabled: bool,
    max_redirects: u32,
    relative_redirects_allowed: bool,
    circular_redirects_allowed: bool,
    authentication_enabled: bool,
    max_auth_rounds: u32,
    target_preferred_auth_schemes: Option<Vec<String>>,
    proxy_preferred_auth_schemes: Option<Vec<String>>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            cookie_spec: None,
            redirects_enabled: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            relative_redirects_allowed: true,
            circular_redirects_allowed: false,
            authentication_enabled: true,
            max_auth_rounds: DEFAULT_MAX_AUTH_ROUNDS,
            target_preferred_auth_schemes: None,
            proxy_preferred_auth_schemes: None,
        }
    }
}

impl RequestConfig {
    /// Selects the cookie policy by registry name.
    #[must_use]
    pub fn with_cookie_spec(mut self, policy: impl Into<String>) -> Self {
        self.cookie_spec = Some(policy.into());
        self
    }

    #[must_use]
    pub fn with_redirects_enabled(mut self, enabled: bool) -> Self {
        self.redirects_enabled = enabled;
        self
    }

    /// Sets the redirect bound. Zero means no redirect is followed.
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn with_relative_redirects_allowed(mut self, allowed: bool) -> Self {
        self.relative_redirects_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_circular_redirects_allowed(mut self, allowed: bool) -> Self {
        self.circular_redirects_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_authentication_enabled(mut self, enabled: bool) -> Self {
        self.authentication_enabled = enabled;
        self
    }

    /// Bounds the requests sent for one logical request while answering
    /// challenges. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_max_auth_rounds(mut self, max_auth_rounds: u32) -> Self {
        self.max_auth_rounds = max_auth_rounds.max(1);
        self
    }

    /// Overrides the scheme preference order for origin authentication.
    #[must_use]
    pub fn with_target_preferred_auth_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_preferred_auth_schemes = Some(schemes.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the scheme preference order for proxy authentication.
    #[must_use]
    pub fn with_proxy_preferred_auth_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxy_preferred_auth_schemes = Some(schemes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn cookie_spec(&self) -> Option<&str> {
        self.cookie_spec.as_deref()
    }

    #[must_use]
    pub fn redirects_enabled(&self) -> bool {
        self.redirects_enabled
    }

    #[must_use]
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    #[must_use]
    pub fn relative_redirects_allowed(&self) -> bool {
        self.relative_redirects_allowed
    }

    #[must_use]
    pub fn circular_redirects_allowed(&self) -> bool {
        self.circular_redirects_allowed
    }

    #[must_use]
    pub fn authentication_enabled(&self) -> bool {
        self.authentication_enabled
    }

    #[must_use]
    pub fn max_auth_rounds(&self) -> u32 {
        self.max_auth_rounds
    }

    #[must_use]
    pub fn target_preferred_auth_schemes(&self) -> Option<&[String]> {
        self.target_preferred_auth_schemes.as_deref()
    }

    #[must_use]
    pub fn proxy_preferred_auth_schemes(&self) -> Option<&[String]> {
        self.proxy_preferred_auth_schemes.as_deref()
    }
}

/// Typed state threaded through one exchange.
#[derive(Debug, Default)]
pub struct ExchangeContext {
    /// Configuration for every request of the exchange.
    pub config: RequestConfig,
    /// Target of the current round, possibly virtual.
    pub target_host: Option<HttpHost>,
    /// Route of the current round.
    pub route: Option<Route>,
    /// Cookie spec resolved by the request side, read by the response side.
    pub cookie_spec: Option<Arc<dyn CookieSpec>>,
    /// Cookie origin derived by the request side, read by the response side.
    pub cookie_origin: Option<CookieOrigin>,
    /// Negotiation with the origin server.
    pub target_auth: AuthState,
    /// Negotiation with the proxy.
    pub proxy_auth: AuthState,
    /// Locations visited by redirects, in order.
    pub redirect_locations: Vec<Url>,
}

impl ExchangeContext {
    /// Creates a context with the given configuration.
    #[must_use]
    pub fn new(config: RequestConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}
