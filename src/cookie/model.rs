//! Cookie values and the origin they are matched against.

use std::fmt;
use std::time::SystemTime;

/// A stored HTTP cookie.
///
/// The value is redacted in `Debug` output so stores can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    version: u32,
    expiry: Option<SystemTime>,
    secure: bool,
    ports: Option<Vec<u16>>,
    comment: Option<String>,
    discard: bool,
    domain_attribute: bool,
    path_attribute: bool,
    port_attribute: bool,
    set_cookie2: bool,
}

/// Identity of a cookie inside a store: name, lower-cased domain and path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CookieKey {
    name: String,
    domain: String,
    path: String,
}

impl Cookie {
    /// Creates a session cookie with root path and no domain.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            version: 0,
            expiry: None,
            secure: false,
            ports: None,
            comment: None,
            discard: false,
            domain_attribute: false,
            path_attribute: false,
            port_attribute: false,
            set_cookie2: false,
        }
    }

    /// Sets the domain (lower-cased).
    #[must_use]
    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domain = domain.as_ref().to_ascii_lowercase();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: Option<SystemTime>) -> Self {
        self.expiry = expiry;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Restricts the cookie to the given ports (RFC 2965 `Port`).
    #[must_use]
    pub fn with_ports(mut self, ports: Option<Vec<u16>>) -> Self {
        self.ports = ports;
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    #[must_use]
    pub fn with_discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    /// Records whether `Domain` was given explicitly.
    #[must_use]
    pub fn with_domain_attribute(mut self, specified: bool) -> Self {
        self.domain_attribute = specified;
        self
    }

    /// Records whether `Path` was given explicitly.
    #[must_use]
    pub fn with_path_attribute(mut self, specified: bool) -> Self {
        self.path_attribute = specified;
        self
    }

    /// Records whether `Port` was given explicitly.
    #[must_use]
    pub fn with_port_attribute(mut self, specified: bool) -> Self {
        self.port_attribute = specified;
        self
    }

    /// Marks the cookie as received through `Set-Cookie2`.
    #[must_use]
    pub fn with_set_cookie2(mut self, set_cookie2: bool) -> Self {
        self.set_cookie2 = set_cookie2;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn expiry(&self) -> Option<SystemTime> {
        self.expiry
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn ports(&self) -> Option<&[u16]> {
        self.ports.as_deref()
    }

    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    #[must_use]
    pub fn is_discard(&self) -> bool {
        self.discard
    }

    #[must_use]
    pub fn has_domain_attribute(&self) -> bool {
        self.domain_attribute
    }

    #[must_use]
    pub fn has_path_attribute(&self) -> bool {
        self.path_attribute
    }

    #[must_use]
    pub fn has_port_attribute(&self) -> bool {
        self.port_attribute
    }

    #[must_use]
    pub fn is_set_cookie2(&self) -> bool {
        self.set_cookie2
    }

    /// Persistent cookies carry an expiry and are not marked `Discard`.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.expiry.is_some() && !self.discard
    }

    /// A cookie is expired once its expiry is at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Store identity.
    #[must_use]
    pub fn key(&self) -> CookieKey {
        CookieKey {
            name: self.name.clone(),
            domain: self.domain.to_ascii_lowercase(),
            path: self.path.clone(),
        }
    }

    /// One-line summary for logs: value truncated, never more than 100 chars.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut value: String = self.value.chars().take(100).collect();
        if self.value.chars().count() > 100 {
            value.push_str("...");
        }
        format!(
            "{}=\"{value}\", version:{}, domain:{}, path:{}, expiry:{}",
            self.name,
            self.version,
            self.domain,
            self.path,
            self.expiry
                .map_or_else(|| "session".to_string(), httpdate::fmt_http_date)
        )
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("expiry", &self.expiry)
            .field("secure", &self.secure)
            .field("set_cookie2", &self.set_cookie2)
            .finish_non_exhaustive()
    }
}

/// The (host, port, path, security) tuple cookies are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOrigin {
    host: String,
    port: u16,
    path: String,
    secure: bool,
}

impl CookieOrigin {
    /// Creates an origin. The host is lower-cased; an empty path becomes `/`.
    #[must_use]
    pub fn new(host: impl AsRef<str>, port: u16, path: impl Into<String>, secure: bool) -> Self {
        let path = path.into();
        Self {
            host: host.as_ref().to_ascii_lowercase(),
            port,
            path: if path.is_empty() { "/".to_string() } else { path },
            secure,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl fmt::Display for CookieOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secure {
            f.write_str("(secure)")?;
        }
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cookie_debug_redacts_value() {
        let cookie = Cookie::new("session", "super_secret_token").with_domain("a.example");
        let debug_str = format!("{cookie:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super_secret_token"));
    }

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let now = SystemTime::now();
        let cookie = Cookie::new("a", "b").with_expiry(Some(now));
        assert!(cookie.is_expired(now));
        assert!(!cookie.is_expired(now - Duration::from_secs(1)));
        assert!(!Cookie::new("a", "b").is_expired(now));
    }

    #[test]
    fn test_key_ignores_domain_case() {
        let upper = Cookie::new("sid", "1").with_domain("A.Example");
        let lower = Cookie::new("sid", "2").with_domain("a.example");
        assert_eq!(upper.key(), lower.key());
        assert_ne!(upper.key(), lower.clone().with_path("/x").key());
    }

    #[test]
    fn test_origin_defaults_empty_path() {
        let origin = CookieOrigin::new("A.Example", 80, "", false);
        assert_eq!(origin.host(), "a.example");
        assert_eq!(origin.path(), "/");
        assert_eq!(origin.to_string(), "a.example:80/");
    }

    #[test]
    fn test_summary_truncates_long_values() {
        let cookie = Cookie::new("big", "x".repeat(150));
        let summary = cookie.summary();
        assert!(summary.contains(&format!("{}...", "x".repeat(100))));
        assert!(summary.contains("expiry:session"));
    }
}
