//! Lexical helpers shared by the cookie specs.
//!
//! Header values are split into elements (`name=value; attr=val; flag`),
//! honouring double quotes so that separators inside quoted values survive.

use std::time::SystemTime;

use super::CookieError;

/// One `name=value` element with its attributes.
///
/// Attribute names are lower-cased; flag attributes carry no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderElement {
    pub name: String,
    pub value: String,
    pub params: Vec<(String, Option<String>)>,
}

impl HeaderElement {
    /// Returns true when the attribute is present, with or without a value.
    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(key, _)| key == name)
    }
}

/// Splits `input` on `separator`, ignoring separators inside double quotes.
pub(crate) fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Parses a single element; commas are treated as part of values.
pub(crate) fn parse_element(input: &str) -> Result<HeaderElement, CookieError> {
    let mut parts = split_unquoted(input, ';').into_iter();
    let first = parts.next().unwrap_or_default().trim();
    let (name, value) = match first.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (first, ""),
    };
    if name.is_empty() {
        return Err(CookieError::malformed("cookie name may not be empty"));
    }

    let params = parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, val)) => (key.trim().to_ascii_lowercase(), Some(val.trim().to_string())),
            None => (part.to_ascii_lowercase(), None),
        })
        .collect();

    Ok(HeaderElement {
        name: name.to_string(),
        value: value.to_string(),
        params,
    })
}

/// Parses a comma-separated list of elements.
pub(crate) fn parse_elements(input: &str) -> Result<Vec<HeaderElement>, CookieError> {
    split_unquoted(input, ',')
        .into_iter()
        .filter(|element| !element.trim().is_empty())
        .map(parse_element)
        .collect()
}

/// Strips one pair of surrounding double quotes.
pub(crate) fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parses an `Expires` date.
///
/// Accepts the three HTTP date formats plus the Netscape
/// `Wdy, DD-Mon-YY[YY] HH:MM:SS GMT` variant.
pub(crate) fn parse_cookie_date(value: &str) -> Option<SystemTime> {
    let value = unquote(value.trim());
    httpdate::parse_http_date(value)
        .ok()
        .or_else(|| normalize_netscape_date(value).and_then(|d| httpdate::parse_http_date(&d).ok()))
}

fn normalize_netscape_date(value: &str) -> Option<String> {
    let spaced = value.replace('-', " ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let [weekday, day, month, year, time, zone] = tokens.as_slice() else {
        return None;
    };
    let weekday = weekday.trim_end_matches(',');
    let weekday = weekday.get(..3)?;
    let year = match year.len() {
        2 => {
            let short: u32 = year.parse().ok()?;
            if short < 70 { 2000 + short } else { 1900 + short }
        }
        4 => year.parse().ok()?,
        _ => return None,
    };
    let day: u32 = day.parse().ok()?;
    Some(format!("{weekday}, {day:02} {month} {year} {time} {zone}"))
}

/// Default cookie path: the request path up to its last `/`.
pub(crate) fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

/// Prefix path match with a segment boundary.
pub(crate) fn path_match(request_path: &str, cookie_path: &str) -> bool {
    let mut cookie_path = if cookie_path.is_empty() { "/" } else { cookie_path };
    if cookie_path.len() > 1 && cookie_path.ends_with('/') {
        cookie_path = &cookie_path[..cookie_path.len() - 1];
    }
    if !request_path.starts_with(cookie_path) {
        return false;
    }
    request_path.len() == cookie_path.len()
        || cookie_path.ends_with('/')
        || request_path.as_bytes()[cookie_path.len()] == b'/'
}
