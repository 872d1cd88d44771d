//! Authentication challenges.

use std::collections::HashMap;
use std::fmt;

use reqwest::StatusCode;
use reqwest::header::HeaderName;

use super::AuthError;
use crate::http::headers;

/// Which party issued a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeTarget {
    /// The origin server (`401`, `WWW-Authenticate`).
    Target,
    /// A proxy (`407`, `Proxy-Authenticate`).
    Proxy,
}

impl ChallengeTarget {
    /// Status code demanding authentication.
    #[must_use]
    pub fn unauthorized_status(self) -> StatusCode {
        match self {
            Self::Target => StatusCode::UNAUTHORIZED,
            Self::Proxy => StatusCode::PROXY_AUTHENTICATION_REQUIRED,
        }
    }

    /// Response header carrying challenges.
    #[must_use]
    pub fn challenge_header(self) -> HeaderName {
        match self {
            Self::Target => headers::WWW_AUTHENTICATE,
            Self::Proxy => headers::PROXY_AUTHENTICATE,
        }
    }

    /// Request header carrying the credentials.
    #[must_use]
    pub fn response_header(self) -> HeaderName {
        match self {
            Self::Target => headers::AUTHORIZATION,
            Self::Proxy => headers::PROXY_AUTHORIZATION,
        }
    }

    #[must_use]
    pub fn is_proxy(self) -> bool {
        self == Self::Proxy
    }
}

impl fmt::Display for ChallengeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Target => "target",
            Self::Proxy => "proxy",
        })
    }
}

/// One parsed challenge header.
///
/// A challenge carries either a single opaque token (`NTLM TlRMTVNT...`) or
/// a list of `name=value` parameters (`Digest realm="x", nonce="y"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    target: ChallengeTarget,
    scheme: String,
    token: Option<String>,
    params: Vec<(String, String)>,
}

impl AuthChallenge {
    /// Parses a challenge header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedChallenge`] when the value carries no
    /// scheme name or a parameter is malformed.
    pub fn parse(target: ChallengeTarget, value: &str) -> Result<Self, AuthError> {
        let value = value.trim();
        let (scheme, rest) = value
            .split_once(char::is_whitespace)
            .map_or((value, ""), |(scheme, rest)| (scheme, rest.trim()));
        if scheme.is_empty() || !scheme.chars().all(is_token_char) {
            return Err(AuthError::malformed_challenge(format!(
                "invalid scheme identifier: {value}"
            )));
        }

        let mut challenge = Self {
            target,
            scheme: scheme.to_ascii_lowercase(),
            token: None,
            params: Vec::new(),
        };
        if rest.is_empty() {
            return Ok(challenge);
        }
        if is_token68(rest) {
            challenge.token = Some(rest.to_string());
            return Ok(challenge);
        }

        for part in split_params(rest) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, raw) = part.split_once('=').ok_or_else(|| {
                AuthError::malformed_challenge(format!("invalid auth parameter: {part}"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(AuthError::malformed_challenge(format!(
                    "invalid auth parameter: {part}"
                )));
            }
            challenge
                .params
                .push((name.to_ascii_lowercase(), unquote(raw.trim())));
        }
        Ok(challenge)
    }

    #[must_use]
    pub fn target(&self) -> ChallengeTarget {
        self.target
    }

    /// Lower-cased scheme name.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Opaque token, for token-style challenges.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Parameter by case-insensitive name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Challenges of one response by lower-cased scheme name.
pub type ChallengeMap = HashMap<String, AuthChallenge>;

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token68(value: &str) -> bool {
    let body = value.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-._~+/".contains(c))
}

fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (idx, ch) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
