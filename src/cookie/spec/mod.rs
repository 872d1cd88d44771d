//! Cookie management policies.
//!
//! A [`CookieSpec`] parses `Set-Cookie`/`Set-Cookie2` headers, validates the
//! result against the request origin, decides which stored cookies match a
//! request, and formats `Cookie` headers. Specs are stateless and shared
//! through a [`CookieSpecRegistry`] keyed by policy name.

mod best_match;
mod compat;
mod ignore;
mod rfc2965;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderValue;
use tracing::warn;

pub use best_match::BestMatchSpec;
pub use compat::BrowserCompatSpec;
pub use ignore::IgnoreSpec;
pub use rfc2965::Rfc2965Spec;

use super::{Cookie, CookieError, CookieOrigin};

/// Registered policy names.
pub mod policy {
    /// Picks between the compatibility and RFC 2965 rules per cookie.
    pub const BEST_MATCH: &str = "best-match";
    /// Browser compatible, Netscape-draft style handling.
    pub const BROWSER_COMPATIBILITY: &str = "compatibility";
    /// Strict RFC 2965 handling.
    pub const RFC_2965: &str = "rfc2965";
    /// Neither sends nor accepts cookies.
    pub const IGNORE_COOKIES: &str = "ignoreCookies";
}

/// Policy used when the request configuration names none.
pub const DEFAULT_COOKIE_POLICY: &str = policy::BEST_MATCH;

/// Which response header a cookie value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCookieKind {
    /// `Set-Cookie`
    SetCookie,
    /// `Set-Cookie2`
    SetCookie2,
}

/// A cookie management policy.
pub trait CookieSpec: fmt::Debug + Send + Sync {
    /// Highest cookie version this policy produces.
    fn version(&self) -> u32;

    /// Parses one response header value into cookies.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Malformed`] when the header cannot be parsed or
    /// the header kind is not handled by this policy.
    fn parse(
        &self,
        kind: SetCookieKind,
        value: &str,
        origin: &CookieOrigin,
    ) -> Result<Vec<Cookie>, CookieError>;

    /// Checks a parsed cookie against the origin that set it.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Rejected`] when a restriction is violated.
    fn validate(&self, cookie: &Cookie, origin: &CookieOrigin) -> Result<(), CookieError>;

    /// Returns true when `cookie` should be sent to `origin`.
    fn matches(&self, cookie: &Cookie, origin: &CookieOrigin) -> bool;

    /// Formats matched cookies into `Cookie` header values.
    fn format_cookies(&self, cookies: &[Cookie]) -> Vec<HeaderValue>;

    /// `Cookie2` value advertising the supported version, if any.
    fn version_header(&self) -> Option<HeaderValue>;
}

/// Cookie specs by case-insensitive policy name.
#[derive(Debug, Clone)]
pub struct CookieSpecRegistry {
    specs: HashMap<String, Arc<dyn CookieSpec>>,
}

impl CookieSpecRegistry {
    /// Creates a registry with no policies.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Registers (or replaces) a policy.
    pub fn register(&mut self, name: &str, spec: Arc<dyn CookieSpec>) {
        self.specs.insert(name.to_ascii_lowercase(), spec);
    }

    /// Looks up a policy by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CookieSpec>> {
        self.specs.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Registered policy names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CookieSpecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(policy::BEST_MATCH, Arc::new(BestMatchSpec::new()));
        registry.register(policy::BROWSER_COMPATIBILITY, Arc::new(BrowserCompatSpec));
        registry.register(policy::RFC_2965, Arc::new(Rfc2965Spec));
        registry.register(policy::IGNORE_COOKIES, Arc::new(IgnoreSpec));
        registry
    }
}

/// Expiry for a `Max-Age` attribute; non-positive values expire immediately.
fn max_age_expiry(value: Option<&str>) -> Result<Option<SystemTime>, CookieError> {
    let raw = value
        .map(super::parse::unquote)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CookieError::malformed("missing value for max-age attribute"))?;
    let seconds: i64 = raw
        .parse()
        .map_err(|_| CookieError::malformed(format!("invalid max-age attribute: {raw}")))?;
    if seconds <= 0 {
        return Ok(Some(UNIX_EPOCH));
    }
    Ok(SystemTime::now().checked_add(Duration::from_secs(seconds.unsigned_abs())))
}

/// Parses a `Version` attribute value.
fn parse_version(value: Option<&str>) -> Result<u32, CookieError> {
    let raw = value
        .map(super::parse::unquote)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CookieError::malformed("missing value for version attribute"))?;
    raw.parse()
        .map_err(|_| CookieError::malformed(format!("invalid cookie version: {raw}")))
}

fn header_value(value: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(value) {
        Ok(header) => Some(header),
        Err(_) => {
            warn!("cookie header contains characters not allowed in a header value; dropped");
            None
        }
    }
}
