//! Policy that picks compatibility or RFC 2965 rules per cookie.

use reqwest::header::HeaderValue;

use super::{BrowserCompatSpec, CookieSpec, Rfc2965Spec, SetCookieKind};
use crate::cookie::parse;
use crate::cookie::{Cookie, CookieError, CookieOrigin};

/// Default policy.
///
/// Versioned cookies (`Set-Cookie2`, or `Set-Cookie` carrying `Version`
/// without a Netscape `Expires`) follow RFC 2965; everything else follows
/// the browser compatible rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestMatchSpec {
    strict: Rfc2965Spec,
    compat: BrowserCompatSpec,
}

impl BestMatchSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieSpec for BestMatchSpec {
    fn version(&self) -> u32 {
        self.strict.version()
    }

    fn parse(
        &self,
        kind: SetCookieKind,
        value: &str,
        origin: &CookieOrigin,
    ) -> Result<Vec<Cookie>, CookieError> {
        if kind == SetCookieKind::SetCookie2 {
            return self.strict.parse(kind, value, origin);
        }
        // Parsed as one element so Expires commas cannot split it.
        let element = parse::parse_element(value)?;
        // Versioned cookies carrying Expires take the compatibility rules;
        // there is no separate Netscape draft policy.
        if element.has_param("version") && !element.has_param("expires") {
            self.strict.parse(kind, value, origin)
        } else {
            self.compat.parse(kind, value, origin)
        }
    }

    fn validate(&self, cookie: &Cookie, origin: &CookieOrigin) -> Result<(), CookieError> {
        if cookie.version() > 0 {
            self.strict.validate(cookie, origin)
        } else {
            self.compat.validate(cookie, origin)
        }
    }

    fn matches(&self, cookie: &Cookie, origin: &CookieOrigin) -> bool {
        if cookie.version() > 0 {
            self.strict.matches(cookie, origin)
        } else {
            self.compat.matches(cookie, origin)
        }
    }

    fn format_cookies(&self, cookies: &[Cookie]) -> Vec<HeaderValue> {
        let version = cookies.iter().map(Cookie::version).min().unwrap_or(0);
        if version > 0 {
            self.strict.format_cookies(cookies)
        } else {
            self.compat.format_cookies(cookies)
        }
    }

    fn version_header(&self) -> Option<HeaderValue> {
        self.strict.version_header()
    }
}
