//! RFC 2965 cookie handling.

use std::collections::HashSet;

use reqwest::header::HeaderValue;

use super::{CookieSpec, SetCookieKind, header_value, max_age_expiry, parse_version};
use crate::cookie::parse::{self, HeaderElement};
use crate::cookie::{Cookie, CookieError, CookieOrigin};

/// Strict RFC 2965 policy (`Set-Cookie2` / `Cookie2`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc2965Spec;

/// Host names without a dot get `.local` appended.
fn effective_host(host: &str) -> String {
    if host.contains('.') {
        host.to_string()
    } else {
        format!("{host}.local")
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain || (domain.starts_with('.') && host.ends_with(domain))
}

/// The host prefix left of `domain` must not contain a dot.
fn host_prefix_is_single_label(host: &str, domain: &str) -> bool {
    host.len() >= domain.len() && !host[..host.len() - domain.len()].contains('.')
}

fn parse_ports(value: &str) -> Result<Vec<u16>, CookieError> {
    parse::unquote(value)
        .split(',')
        .map(|port| {
            port.trim()
                .parse::<u16>()
                .map_err(|_| CookieError::malformed(format!("invalid port attribute: {value}")))
        })
        .collect()
}

impl Rfc2965Spec {
    fn cookie_from_element(
        element: HeaderElement,
        kind: SetCookieKind,
        origin: &CookieOrigin,
    ) -> Result<Cookie, CookieError> {
        let mut cookie = Cookie::new(element.name, parse::unquote(&element.value))
            .with_domain(effective_host(origin.host()))
            .with_path(parse::default_path(origin.path()))
            .with_set_cookie2(kind == SetCookieKind::SetCookie2);

        // Only the first occurrence of an attribute counts.
        let mut seen = HashSet::new();
        for (key, value) in element.params {
            if !seen.insert(key.clone()) {
                continue;
            }
            let value = value.as_deref().map(parse::unquote);
            match key.as_str() {
                "path" => {
                    let path = value
                        .ok_or_else(|| CookieError::malformed("missing value for path attribute"))?;
                    let path = if path.trim().is_empty() { "/" } else { path };
                    cookie = cookie.with_path(path).with_path_attribute(true);
                }
                "domain" => {
                    let domain = value
                        .filter(|v| !v.trim().is_empty())
                        .ok_or_else(|| CookieError::malformed("blank value for domain attribute"))?;
                    let domain = if domain.starts_with('.') {
                        domain.to_string()
                    } else {
                        format!(".{domain}")
                    };
                    cookie = cookie.with_domain(domain).with_domain_attribute(true);
                }
                "port" => {
                    let ports = match value.filter(|v| !v.trim().is_empty()) {
                        Some(list) => parse_ports(list)?,
                        None => vec![origin.port()],
                    };
                    cookie = cookie.with_ports(Some(ports)).with_port_attribute(true);
                }
                "max-age" => cookie = cookie.with_expiry(max_age_expiry(value)?),
                "secure" => cookie = cookie.with_secure(true),
                "comment" => cookie = cookie.with_comment(value.map(str::to_string)),
                "discard" => cookie = cookie.with_discard(true),
                "version" => cookie = cookie.with_version(parse_version(value)?),
                _ => {}
            }
        }
        Ok(cookie)
    }
}

impl CookieSpec for Rfc2965Spec {
    fn version(&self) -> u32 {
        1
    }

    fn parse(
        &self,
        kind: SetCookieKind,
        value: &str,
        origin: &CookieOrigin,
    ) -> Result<Vec<Cookie>, CookieError> {
        parse::parse_elements(value)?
            .into_iter()
            .map(|element| Self::cookie_from_element(element, kind, origin))
            .collect()
    }

    fn validate(&self, cookie: &Cookie, origin: &CookieOrigin) -> Result<(), CookieError> {
        if cookie.is_set_cookie2() && cookie.version() == 0 {
            return Err(CookieError::rejected(
                "violates RFC 2965: version attribute is required",
            ));
        }

        let host = effective_host(origin.host());
        let domain = cookie.domain();
        if cookie.has_domain_attribute() {
            if !domain.starts_with('.') {
                return Err(CookieError::rejected(format!(
                    "domain attribute \"{domain}\" violates RFC 2965: must start with a dot"
                )));
            }
            let embedded_dot = domain[1..].find('.').map(|idx| idx + 1);
            let no_embedded = embedded_dot.is_none_or(|idx| idx == domain.len() - 1);
            if no_embedded && domain != ".local" {
                return Err(CookieError::rejected(format!(
                    "domain attribute \"{domain}\" violates RFC 2965: no embedded dots and not .local"
                )));
            }
            if !domain_match(&host, domain) {
                return Err(CookieError::rejected(format!(
                    "domain attribute \"{domain}\" violates RFC 2965: effective host \"{host}\" does not domain-match"
                )));
            }
            if !host_prefix_is_single_label(&host, domain) {
                return Err(CookieError::rejected(format!(
                    "domain attribute \"{domain}\" violates RFC 2965: effective host minus domain may not contain dots"
                )));
            }
        } else if domain != host {
            return Err(CookieError::rejected(format!(
                "illegal domain attribute \"{domain}\"; domain of origin: \"{host}\""
            )));
        }

        if cookie.has_port_attribute()
            && !cookie.ports().is_some_and(|ports| ports.contains(&origin.port()))
        {
            return Err(CookieError::rejected(
                "port attribute violates RFC 2965: request port not in the cookie's port list",
            ));
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
        let host = effective_host(origin.host());
        let domain = cookie.domain();
        let port_ok = !cookie.has_port_attribute()
            || cookie.ports().is_some_and(|ports| ports.contains(&origin.port()));
        domain_match(&host, domain)
            && host_prefix_is_single_label(&host, domain)
            && port_ok
            && parse::path_match(origin.path(), cookie.path())
            && (!cookie.is_secure() || origin.is_secure())
    }

    fn format_cookies(&self, cookies: &[Cookie]) -> Vec<HeaderValue> {
        let Some(version) = cookies.iter().map(Cookie::version).min() else {
            return Vec::new();
        };
        // More specific paths first; stable for equal lengths.
        let mut ordered: Vec<&Cookie> = cookies.iter().collect();
        ordered.sort_by_key(|cookie| std::cmp::Reverse(cookie.path().len()));

        let mut header = format!("$Version={version}");
        for cookie in ordered {
            header.push_str(&format!("; {}=\"{}\"", cookie.name(), cookie.value()));
            if cookie.has_path_attribute() {
                header.push_str(&format!("; $Path=\"{}\"", cookie.path()));
            }
            if cookie.has_domain_attribute() {
                header.push_str(&format!("; $Domain=\"{}\"", cookie.domain()));
            }
            if cookie.has_port_attribute() {
                match cookie.ports() {
                    Some(ports) if !ports.is_empty() => {
                        let list = ports
                            .iter()
                            .map(u16::to_string)
                            .collect::<Vec<_>>()
                            .join(",");
                        header.push_str(&format!("; $Port=\"{list}\""));
                    }
                    _ => header.push_str("; $Port"),
                }
            }
        }
        header_value(&header).into_iter().collect()
    }

    fn version_header(&self) -> Option<HeaderValue> {
        Some(HeaderValue::from_static("$Version=1"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn origin(host: &str, port: u16, path: &str) -> CookieOrigin {
        CookieOrigin::new(host, port, path, false)
    }

    #[test]
    fn test_parse_set_cookie2_attributes() {
        let cookies = Rfc2965Spec
            .parse(
                SetCookieKind::SetCookie2,
                r#"sid="abc"; Version=1; Domain=a.example; Path="/"; Port="80,8080"; Discard"#,
                &origin("www.a.example", 80, "/x"),
            )
            .unwrap();
        let cookie = &cookies[0];
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.domain(), ".a.example");
        assert_eq!(cookie.ports(), Some(&[80, 8080][..]));
        assert!(cookie.is_discard());
        assert!(cookie.is_set_cookie2());
        assert_eq!(cookie.version(), 1);
    }

    #[test]
    fn test_first_attribute_occurrence_wins() {
        let cookies = Rfc2965Spec
            .parse(
                SetCookieKind::SetCookie2,
                "a=b; Version=1; Path=/first; Path=/second",
                &origin("www.a.example", 80, "/first/x"),
            )
            .unwrap();
        assert_eq!(cookies[0].path(), "/first");
    }

    #[test]
    fn test_blank_port_uses_request_port() {
        let cookies = Rfc2965Spec
            .parse(
                SetCookieKind::SetCookie2,
                "a=b; Version=1; Port",
                &origin("www.a.example", 8080, "/"),
            )
            .unwrap();
        assert_eq!(cookies[0].ports(), Some(&[8080][..]));
    }

    #[test]
    fn test_validate_requires_version_for_set_cookie2() {
        let origin = origin("www.a.example", 80, "/");
        let cookie = Rfc2965Spec
            .parse(SetCookieKind::SetCookie2, "a=b", &origin)
            .unwrap()
            .remove(0);
        assert!(matches!(
            Rfc2965Spec.validate(&cookie, &origin),
            Err(CookieError::Rejected { .. })
        ));
    }

    #[test]
    fn test_validate_domain_rules() {
        let origin = origin("www.a.example", 80, "/");
        let parse = |header: &str| {
            Rfc2965Spec
                .parse(SetCookieKind::SetCookie2, header, &origin)
                .unwrap()
                .remove(0)
        };
        assert!(Rfc2965Spec.validate(&parse("a=b; Version=1; Domain=.a.example"), &origin).is_ok());
        // no embedded dot
        assert!(Rfc2965Spec.validate(&parse("a=b; Version=1; Domain=.example"), &origin).is_err());
        // host prefix has a dot
        let deep = CookieOrigin::new("x.www.a.example", 80, "/", false);
        let cookie = Rfc2965Spec
            .parse(SetCookieKind::SetCookie2, "a=b; Version=1; Domain=.a.example", &deep)
            .unwrap()
            .remove(0);
        assert!(Rfc2965Spec.validate(&cookie, &deep).is_err());
    }

    #[test]
    fn test_dotless_host_gets_local_suffix() {
        let origin = origin("intranet", 80, "/");
        let cookie = Rfc2965Spec
            .parse(SetCookieKind::SetCookie2, "a=b; Version=1", &origin)
            .unwrap()
            .remove(0);
        assert_eq!(cookie.domain(), "intranet.local");
        assert!(Rfc2965Spec.validate(&cookie, &origin).is_ok());
        assert!(Rfc2965Spec.matches(&cookie, &origin));
    }

    #[test]
    fn test_port_list_restricts_matching() {
        let cookie = Cookie::new("a", "b")
            .with_domain("www.a.example")
            .with_version(1)
            .with_ports(Some(vec![8080]))
            .with_port_attribute(true);
        assert!(Rfc2965Spec.matches(&cookie, &origin("www.a.example", 8080, "/")));
        assert!(!Rfc2965Spec.matches(&cookie, &origin("www.a.example", 80, "/")));
    }

    #[test]
    fn test_format_includes_specified_attributes() {
        let cookie = Cookie::new("sid", "abc")
            .with_domain(".a.example")
            .with_domain_attribute(true)
            .with_path("/")
            .with_path_attribute(true)
            .with_version(1);
        let headers = Rfc2965Spec.format_cookies(&[cookie]);
        assert_eq!(
            headers[0].to_str().unwrap(),
            r#"$Version=1; sid="abc"; $Path="/"; $Domain=".a.example""#
        );
        assert_eq!(Rfc2965Spec.version_header().unwrap(), "$Version=1");
    }
}
