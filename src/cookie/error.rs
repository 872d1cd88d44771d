//! Cookie error types.

use thiserror::Error;

/// Errors raised while parsing, validating or importing cookies.
///
/// `Malformed` and `Rejected` never abort an exchange: the cookie agent logs
/// them and skips the offending header or cookie.
#[derive(Debug, Error)]
pub enum CookieError {
    /// A `Set-Cookie`/`Set-Cookie2` header could not be parsed.
    #[error("malformed cookie header: {reason}")]
    Malformed {
        /// Description of what was wrong.
        reason: String,
    },

    /// A parsed cookie violates the origin restrictions of the active policy.
    #[error("cookie rejected: {reason}")]
    Rejected {
        /// Which restriction was violated.
        reason: String,
    },

    /// A line in a Netscape cookie file has an invalid format.
    #[error("line {line_number}: {reason} (got: {content})")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// The offending line content, with the value redacted.
        content: String,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading a cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

impl CookieError {
    /// Creates a malformed-header error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Creates a restriction-violation error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
