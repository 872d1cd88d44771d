//! Policy that disables cookies.

use reqwest::header::HeaderValue;

use super::{CookieSpec, SetCookieKind};
use crate::cookie::{Cookie, CookieError, CookieOrigin};

/// Accepts nothing and sends nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreSpec;

impl CookieSpec for IgnoreSpec {
    fn version(&self) -> u32 {
        0
    }

    fn parse(
        &self,
        _kind: SetCookieKind,
        _value: &str,
        _origin: &CookieOrigin,
    ) -> Result<Vec<Cookie>, CookieError> {
        Ok(Vec::new())
    }

    fn validate(&self, _cookie: &Cookie, _origin: &CookieOrigin) -> Result<(), CookieError> {
        Ok(())
    }

    fn matches(&self, _cookie: &Cookie, _origin: &CookieOrigin) -> bool {
        false
    }

    fn format_cookies(&self, _cookies: &[Cookie]) -> Vec<HeaderValue> {
        Vec::new()
    }

    fn version_header(&self) -> Option<HeaderValue> {
        None
    }
}
