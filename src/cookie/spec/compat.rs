//! Browser compatible cookie handling.

use reqwest::header::HeaderValue;

use super::{CookieSpec, SetCookieKind, header_value, max_age_expiry, parse_version};
use crate::cookie::parse::{self, HeaderElement};
use crate::cookie::{Cookie, CookieError, CookieOrigin};

/// Lenient, Netscape-draft style policy that mirrors common browser behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserCompatSpec;

impl BrowserCompatSpec {
    fn cookie_from_element(
        element: HeaderElement,
        origin: &CookieOrigin,
    ) -> Result<Cookie, CookieError> {
        let mut cookie = Cookie::new(element.name, element.value)
            .with_domain(origin.host())
            .with_path(parse::default_path(origin.path()));
        let mut max_age = None;

        for (key, value) in element.params {
            let value = value.as_deref();
            match key.as_str() {
                "path" => {
                    let path = value.filter(|v| !v.is_empty()).unwrap_or("/");
                    cookie = cookie.with_path(path).with_path_attribute(true);
                }
                "domain" => {
                    let domain = value
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| CookieError::malformed("blank value for domain attribute"))?;
                    cookie = cookie.with_domain(domain).with_domain_attribute(true);
                }
                "max-age" => max_age = Some(max_age_expiry(value)?),
                "expires" => {
                    let raw = value.unwrap_or_default();
                    let expiry = parse::parse_cookie_date(raw).ok_or_else(|| {
                        CookieError::malformed(format!("unable to parse expires attribute: {raw}"))
                    })?;
                    cookie = cookie.with_expiry(Some(expiry));
                }
                "secure" => cookie = cookie.with_secure(true),
                "comment" => cookie = cookie.with_comment(value.map(str::to_string)),
                "version" => cookie = cookie.with_version(parse_version(value)?),
                _ => {}
            }
        }

        // Max-Age wins over Expires regardless of attribute order.
        if let Some(expiry) = max_age {
            cookie = cookie.with_expiry(expiry);
        }
        Ok(cookie)
    }
}

/// Host matches the cookie domain exactly or as a dot-bounded suffix.
pub(super) fn domain_match(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let bare = domain.strip_prefix('.').unwrap_or(domain);
    host == bare
        || host
            .strip_suffix(bare)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl CookieSpec for BrowserCompatSpec {
    fn version(&self) -> u32 {
        0
    }

    fn parse(
        &self,
        kind: SetCookieKind,
        value: &str,
        origin: &CookieOrigin,
    ) -> Result<Vec<Cookie>, CookieError> {
        if kind != SetCookieKind::SetCookie {
            return Err(CookieError::malformed(format!(
                "unrecognized cookie header {kind:?}"
            )));
        }
        let element = parse::parse_element(value)?;
        // Expires dates contain commas, so only versioned headers without
        // Expires are split into multiple cookies.
        let elements = if element.has_param("version") && !element.has_param("expires") {
            parse::parse_elements(value)?
        } else {
            vec![element]
        };
        elements
            .into_iter()
            .map(|element| Self::cookie_from_element(element, origin))
            .collect()
    }

    fn validate(&self, cookie: &Cookie, origin: &CookieOrigin) -> Result<(), CookieError> {
        let host = origin.host();
        if cookie.domain().is_empty() {
            return Err(CookieError::rejected("cookie domain may not be empty"));
        }
        if !domain_match(host, cookie.domain()) {
            return Err(CookieError::rejected(format!(
                "illegal domain attribute \"{}\"; domain of origin: \"{host}\"",
                cookie.domain()
            )));
        }
        if !parse::path_match(origin.path(), cookie.path()) {
            return Err(CookieError::rejected(format!(
                "illegal path attribute \"{}\"; path of origin: \"{}\"",
                cookie.path(),
                origin.path()
            )));
        }
        Ok(())
    }

    fn matches(&self, cookie: &Cookie, origin: &CookieOrigin) -> bool {
        domain_match(origin.host(), cookie.domain())
            && parse::path_match(origin.path(), cookie.path())
            && (!cookie.is_secure() || origin.is_secure())
    }

    fn format_cookies(&self, cookies: &[Cookie]) -> Vec<HeaderValue> {
        if cookies.is_empty() {
            return Vec::new();
        }
        let joined = cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ");
        header_value(&joined).into_iter().collect()
    }

    fn version_header(&self) -> Option<HeaderValue> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn origin(path: &str) -> CookieOrigin {
        CookieOrigin::new("www.a.example", 80, path, false)
    }

    #[test]
    fn test_parse_applies_defaults() {
        let cookies = BrowserCompatSpec
            .parse(SetCookieKind::SetCookie, "sid=xyz", &origin("/app/page"))
            .unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain(), "www.a.example");
        assert_eq!(cookies[0].path(), "/app");
        assert!(!cookies[0].has_path_attribute());
        assert_eq!(cookies[0].version(), 0);
    }

    #[test]
    fn test_parse_netscape_expires_keeps_single_cookie() {
        let cookies = BrowserCompatSpec
            .parse(
                SetCookieKind::SetCookie,
                "sid=xyz; Expires=Wed, 21-Oct-2015 07:28:00 GMT; Path=/; Domain=.a.example; Secure",
                &origin("/"),
            )
            .unwrap();
        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert_eq!(cookie.expiry(), Some(UNIX_EPOCH + Duration::from_secs(1_445_412_480)));
        assert_eq!(cookie.domain(), ".a.example");
        assert!(cookie.has_domain_attribute());
        assert!(cookie.is_secure());
    }

    #[test]
    fn test_max_age_overrides_expires() {
        let cookies = BrowserCompatSpec
            .parse(
                SetCookieKind::SetCookie,
                "sid=xyz; Max-Age=3600; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
                &origin("/"),
            )
            .unwrap();
        assert!(cookies[0].expiry().unwrap() > SystemTime::now());
    }

    #[test]
    fn test_parse_rejects_bad_expires_and_set_cookie2() {
        assert!(matches!(
            BrowserCompatSpec.parse(SetCookieKind::SetCookie, "a=b; Expires=never", &origin("/")),
            Err(CookieError::Malformed { .. })
        ));
        assert!(
            BrowserCompatSpec
                .parse(SetCookieKind::SetCookie2, "a=b; Version=1", &origin("/"))
                .is_err()
        );
    }

    #[test]
    fn test_versioned_header_splits_on_commas() {
        let cookies = BrowserCompatSpec
            .parse(SetCookieKind::SetCookie, "a=1; Version=1, b=2; Version=1", &origin("/"))
            .unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1].name(), "b");
        assert_eq!(cookies[1].version(), 1);
    }

    #[test]
    fn test_validate_domain_and_path() {
        let ok = Cookie::new("a", "b").with_domain(".a.example").with_path("/");
        assert!(BrowserCompatSpec.validate(&ok, &origin("/x")).is_ok());

        let foreign = Cookie::new("a", "b").with_domain("other.example");
        assert!(matches!(
            BrowserCompatSpec.validate(&foreign, &origin("/x")),
            Err(CookieError::Rejected { .. })
        ));

        let deep = Cookie::new("a", "b").with_domain("www.a.example").with_path("/admin");
        assert!(BrowserCompatSpec.validate(&deep, &origin("/x")).is_err());
    }

    #[test]
    fn test_domain_match_requires_dot_boundary() {
        assert!(domain_match("www.a.example", "a.example"));
        assert!(domain_match("a.example", ".a.example"));
        assert!(!domain_match("bad-a.example", "a.example"));
        assert!(!domain_match("a.example", ""));
    }

    #[test]
    fn test_secure_cookie_needs_secure_origin() {
        let cookie = Cookie::new("a", "b").with_domain("www.a.example").with_secure(true);
        assert!(!BrowserCompatSpec.matches(&cookie, &origin("/")));
        let secure = CookieOrigin::new("www.a.example", 443, "/", true);
        assert!(BrowserCompatSpec.matches(&cookie, &secure));
    }

    #[test]
    fn test_format_joins_into_one_header() {
        let cookies = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];
        let headers = BrowserCompatSpec.format_cookies(&cookies);
        assert_eq!(headers, vec![HeaderValue::from_static("a=1; b=2")]);
        assert!(BrowserCompatSpec.format_cookies(&[]).is_empty());
    }
}
