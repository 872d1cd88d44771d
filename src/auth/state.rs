//! Per-negotiation authentication state.

use std::collections::VecDeque;
use std::fmt;

use super::{AuthScheme, Credentials};

/// Where a negotiation stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthProtocolState {
    /// No challenge seen, or state was reset.
    #[default]
    Unchallenged,
    /// Options selected; the next request carries a first response.
    Challenged,
    /// A multi-round scheme is mid-handshake.
    Handshake,
    /// Negotiation gave up for this target.
    Failure,
    /// A request passed without being challenged again.
    Success,
}

impl fmt::Display for AuthProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unchallenged => "UNCHALLENGED",
            Self::Challenged => "CHALLENGED",
            Self::Handshake => "HANDSHAKE",
            Self::Failure => "FAILURE",
            Self::Success => "SUCCESS",
        })
    }
}

/// A candidate (scheme, credentials) pair offered by an auth strategy.
#[derive(Debug)]
pub struct AuthOption {
    scheme: Box<dyn AuthScheme>,
    credentials: Credentials,
}

impl AuthOption {
    #[must_use]
    pub fn new(scheme: Box<dyn AuthScheme>, credentials: Credentials) -> Self {
        Self {
            scheme,
            credentials,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &dyn AuthScheme {
        self.scheme.as_ref()
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Splits the option into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Box<dyn AuthScheme>, Credentials) {
        (self.scheme, self.credentials)
    }
}

/// Authentication state for one negotiation target (origin or proxy).
///
/// Owned by one exchange; never shared.
#[derive(Debug, Default)]
pub struct AuthState {
    state: AuthProtocolState,
    scheme: Option<Box<dyn AuthScheme>>,
    credentials: Option<Credentials>,
    options: Option<VecDeque<AuthOption>>,
}

impl AuthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to `Unchallenged` with scheme, credentials and options cleared.
    pub fn reset(&mut self) {
        self.state = AuthProtocolState::Unchallenged;
        self.scheme = None;
        self.credentials = None;
        self.options = None;
    }

    #[must_use]
    pub fn state(&self) -> AuthProtocolState {
        self.state
    }

    pub fn set_state(&mut self, state: AuthProtocolState) {
        self.state = state;
    }

    /// Active scheme, if any.
    #[must_use]
    pub fn scheme(&self) -> Option<&dyn AuthScheme> {
        self.scheme.as_deref()
    }

    pub fn scheme_mut(&mut self) -> Option<&mut Box<dyn AuthScheme>> {
        self.scheme.as_mut()
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Scheme and credentials at once, for producing a response.
    pub fn scheme_and_credentials(&mut self) -> Option<(&mut Box<dyn AuthScheme>, &Credentials)> {
        match (&mut self.scheme, &self.credentials) {
            (Some(scheme), Some(credentials)) => Some((scheme, credentials)),
            _ => None,
        }
    }

    /// Installs the active scheme and credentials, dropping pending options.
    pub fn update(&mut self, scheme: Box<dyn AuthScheme>, credentials: Credentials) {
        self.scheme = Some(scheme);
        self.credentials = Some(credentials);
        self.options = None;
    }

    /// Stores the ordered candidate queue, clearing the active scheme.
    pub fn update_options(&mut self, options: VecDeque<AuthOption>) {
        self.options = Some(options);
        self.scheme = None;
        self.credentials = None;
    }

    #[must_use]
    pub fn options(&self) -> Option<&VecDeque<AuthOption>> {
        self.options.as_ref()
    }

    /// Removes and returns the pending options.
    pub fn take_options(&mut self) -> Option<VecDeque<AuthOption>> {
        self.options.take()
    }

    /// Returns true while the active scheme is connection based.
    #[must_use]
    pub fn is_connection_based(&self) -> bool {
        self.scheme().is_some_and(|scheme| scheme.is_connection_based())
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state:{}", self.state)?;
        if let Some(scheme) = &self.scheme {
            write!(f, ";auth scheme:{}", scheme.scheme_name())?;
        }
        if self.credentials.is_some() {
            f.write_str(";credentials present")?;
        }
        Ok(())
    }
}
