//! Netscape cookie file import.
//!
//! Parses the Netscape HTTP cookie file format (7 TAB-separated fields per
//! line) into [`Cookie`]s and loads them into a [`CookieStore`], so an
//! exchange can start from cookies exported by a browser.

use std::io::BufRead;
use std::time::{Duration, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

use super::{Cookie, CookieError, CookieStore};

/// Result of parsing a cookie file, including successfully parsed cookies
/// and any warnings about malformed lines.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed cookies.
    pub cookies: Vec<Cookie>,
    /// Warnings for malformed lines (line number and reason).
    pub warnings: Vec<(usize, String)>,
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Each non-comment, non-blank line must contain exactly 7 TAB-separated fields:
/// `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`, `value`.
/// An `expires` of 0 denotes a session cookie.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when a non-empty file yields zero valid cookies.
/// Individual malformed lines are collected as warnings.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<ParseResult, CookieError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut non_blank_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end();

        // `#HttpOnly_` prefixed lines are cookies, not comments
        let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        non_blank_lines += 1;

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain(),
                    name = %cookie.name(),
                    "parsed cookie"
                );
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && non_blank_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParseResult { cookies, warnings })
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<Cookie, CookieError> {
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        content: redact_line_for_error(line),
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, tailmatch, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    };

    let tailmatch = parse_bool_field(tailmatch, "tailmatch").map_err(&invalid)?;
    let secure = parse_bool_field(secure, "secure").map_err(&invalid)?;
    let expires = expires.parse::<u64>().map_err(|_| {
        invalid(format!(
            "expires field must be a non-negative integer, got '{expires}'"
        ))
    })?;

    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    let expiry = if expires == 0 {
        None
    } else {
        let expiry = UNIX_EPOCH.checked_add(Duration::from_secs(expires));
        if expiry.is_none() {
            warn!(
                line = line_number,
                expires, "cookie expiry timestamp overflows SystemTime; treating as session cookie"
            );
        }
        expiry
    };

    Ok(Cookie::new(*name, *value)
        .with_domain(domain)
        .with_domain_attribute(tailmatch)
        .with_path(if path.is_empty() { "/" } else { *path })
        .with_path_attribute(true)
        .with_secure(secure)
        .with_expiry(expiry))
}

/// Parses a `TRUE`/`FALSE` field.
fn parse_bool_field(value: &str, field_name: &str) -> Result<bool, String> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(format!(
            "{field_name} field must be TRUE or FALSE, got '{value}'"
        )),
    }
}

/// Redacts cookie value (7th field) from a line for safe error messages.
fn redact_line_for_error(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        let mut redacted = fields[..6].join("\t");
        redacted.push_str("\t[REDACTED]");
        redacted
    } else {
        line.to_string()
    }
}

/// Adds parsed cookies to `store`, returning how many were added.
#[instrument(level = "debug", skip_all, fields(count = cookies.len()))]
pub fn load_cookies_into_store(cookies: Vec<Cookie>, store: &dyn CookieStore) -> usize {
    let count = cookies.len();
    for cookie in cookies {
        store.add_cookie(cookie);
    }
    count
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cookie::BasicCookieStore;
    use std::io::Cursor;

    fn cursor(s: &str) -> Cursor<&[u8]> {
        Cursor::new(s.as_bytes())
    }

    #[test]
    fn test_parse_netscape_cookies_valid_file() {
        let input = "\
# Netscape HTTP Cookie File
.example.com\tTRUE\t/\tFALSE\t0\tsession\tabc123
other.com\tFALSE\t/path\tTRUE\t1700000000\ttoken\txyz789
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.cookies.len(), 2);
        assert!(result.warnings.is_empty());

        let first = &result.cookies[0];
        assert_eq!(first.domain(), ".example.com");
        assert!(first.has_domain_attribute());
        assert_eq!(first.expiry(), None);
        assert_eq!(first.value(), "abc123");

        let second = &result.cookies[1];
        assert!(second.is_secure());
        assert_eq!(second.path(), "/path");
        assert_eq!(
            second.expiry(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
    }

    #[test]
    fn test_http_only_prefix_is_a_cookie_line() {
        let input = "#HttpOnly_.example.com\tTRUE\t/\tFALSE\t0\tsid\tabc\n";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.cookies[0].name(), "sid");
    }

    #[test]
    fn test_malformed_lines_become_warnings() {
        let input = "\
.example.com\tTRUE\t/\tFALSE\t0\tgood\tvalue
.example.com\tMAYBE\t/\tFALSE\t0\tbad\tsecret
too\tfew\tfields
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.cookies.len(), 1);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].0, 2);
        assert!(result.warnings[0].1.contains("tailmatch"));
        assert!(!result.warnings[0].1.contains("secret"));
    }

    #[test]
    fn test_all_malformed_is_an_error() {
        let err = parse_netscape_cookies(cursor("garbage line\n")).unwrap_err();
        assert!(matches!(err, CookieError::NoCookiesFound { malformed_count: 1 }));
    }

    #[test]
    fn test_empty_file_yields_no_cookies() {
        let result = parse_netscape_cookies(cursor("# only a header\n\n")).unwrap();
        assert!(result.cookies.is_empty());
    }

    #[test]
    fn test_load_into_store() {
        let input = ".example.com\tTRUE\t/\tFALSE\t0\tsid\tabc\n";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        let store = BasicCookieStore::new();
        assert_eq!(load_cookies_into_store(result.cookies, &store), 1);
        assert_eq!(store.cookies()[0].domain(), ".example.com");
    }
}
