//! Authentication error types.

use thiserror::Error;

/// Errors raised by auth schemes, strategies and the negotiator.
///
/// Within a negotiation most of these are absorbed: a malformed challenge
/// ends the negotiation for that response, and a failing option is skipped
/// in favour of the next one.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A challenge could not be parsed or arrived out of sequence.
    #[error("malformed challenge: {message}")]
    MalformedChallenge {
        /// Description of what was wrong.
        message: String,
    },

    /// A scheme could not produce a response.
    #[error("authentication error: {message}")]
    Authentication {
        /// Description of what was wrong.
        message: String,
    },

    /// Credentials of the wrong kind were supplied to a scheme.
    #[error("invalid credentials: {message}")]
    InvalidCredentials {
        /// Description of what was expected.
        message: String,
    },
}

impl AuthError {
    /// Creates a malformed-challenge error.
    pub fn malformed_challenge(message: impl Into<String>) -> Self {
        Self::MalformedChallenge {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an invalid-credentials error.
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// Returns true for errors that only disqualify the current option.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::InvalidCredentials { .. }
        )
    }
}
