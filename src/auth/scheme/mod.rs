//! Authentication schemes.
//!
//! A scheme consumes challenges and produces credential headers. Schemes are
//! instantiated by name from an [`AuthSchemeRegistry`] so new schemes can be
//! plugged in without touching the negotiator.

mod basic;
mod digest;
mod ntlm;
mod ntlm_engine;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};

pub use basic::BasicScheme;
pub use digest::DigestScheme;
pub use ntlm::{NtlmRetryLimits, NtlmScheme, NtlmStage};
pub use ntlm_engine::{NtlmEngine, NtlmV2Engine};

use super::{AuthChallenge, AuthError, ChallengeTarget, Credentials};
use crate::http::HttpRequest;

/// A challenge/response authentication algorithm.
///
/// Instances carry the negotiation state of one exchange and are owned by a
/// single [`AuthState`](super::AuthState) while active.
pub trait AuthScheme: fmt::Debug + Send + Sync {
    /// Lower-cased scheme name, matching challenge scheme names.
    fn scheme_name(&self) -> &str;

    /// Feeds a challenge received for this scheme.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedChallenge`] when the challenge is
    /// invalid or arrives out of sequence.
    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), AuthError>;

    /// Produces the credential header for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for credentials of the wrong
    /// kind and [`AuthError::Authentication`] when the scheme cannot respond
    /// in its current state.
    fn authenticate(
        &mut self,
        credentials: &Credentials,
        request: &HttpRequest,
    ) -> Result<AuthHeader, AuthError>;

    /// Returns true once the scheme has nothing more to negotiate.
    fn is_complete(&self) -> bool;

    /// Returns true when a successful result is valid for the connection
    /// rather than per request.
    fn is_connection_based(&self) -> bool;

    /// Realm advertised by the last challenge, if the scheme has one.
    fn realm(&self) -> Option<&str> {
        None
    }
}

/// A credential header produced by a scheme.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl AuthHeader {
    /// Creates a header for `target` from an ASCII credential string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Authentication`] when the value is not a valid
    /// header value.
    pub fn new(target: ChallengeTarget, value: &str) -> Result<Self, AuthError> {
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| AuthError::authentication("credential contains invalid header characters"))?;
        value.set_sensitive(true);
        Ok(Self {
            name: target.response_header(),
            value,
        })
    }

    #[must_use]
    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &HeaderValue {
        &self.value
    }

    /// Splits into name and value.
    #[must_use]
    pub fn into_parts(self) -> (HeaderName, HeaderValue) {
        (self.name, self.value)
    }
}

// Custom Debug impl that redacts the credential.
impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Creates a fresh scheme instance.
pub type AuthSchemeFactory = Arc<dyn Fn() -> Box<dyn AuthScheme> + Send + Sync>;

/// Wraps a closure as an [`AuthSchemeFactory`].
pub fn scheme_factory<F>(factory: F) -> AuthSchemeFactory
where
    F: Fn() -> Box<dyn AuthScheme> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Scheme factories by lower-cased name.
#[derive(Clone)]
pub struct AuthSchemeRegistry {
    factories: HashMap<String, AuthSchemeFactory>,
}

impl AuthSchemeRegistry {
    /// Registry without any scheme.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers (or replaces) a factory.
    pub fn register(&mut self, name: &str, factory: AuthSchemeFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    /// Instantiates the scheme registered under `name`.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn AuthScheme>> {
        self.factories
            .get(&name.to_ascii_lowercase())
            .map(|factory| factory())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Default registry with NTLM retry bounds other than the defaults.
    #[must_use]
    pub fn with_ntlm_limits(limits: NtlmRetryLimits) -> Self {
        let mut registry = Self::default();
        registry.register(
            "ntlm",
            scheme_factory(move || Box::new(NtlmScheme::new(Arc::new(NtlmV2Engine::new()), limits))),
        );
        registry
    }
}

impl Default for AuthSchemeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("basic", scheme_factory(|| Box::new(BasicScheme::new())));
        registry.register("digest", scheme_factory(|| Box::new(DigestScheme::new())));
        registry.register("ntlm", scheme_factory(|| Box::new(NtlmScheme::default())));
        registry
    }
}

impl fmt::Debug for AuthSchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSchemeRegistry")
            .field("schemes", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_creates_fresh_instances() {
        let registry = AuthSchemeRegistry::default();
        assert_eq!(registry.names(), vec!["basic", "digest", "ntlm"]);
        let scheme = registry.create("NTLM").unwrap();
        assert_eq!(scheme.scheme_name(), "ntlm");
        assert!(scheme.is_connection_based());
        assert!(!scheme.is_complete());
        assert!(registry.create("negotiate").is_none());
    }

    #[test]
    fn test_auth_header_debug_redacts_value() {
        let header = AuthHeader::new(ChallengeTarget::Proxy, "Basic dTpw").unwrap();
        assert_eq!(header.name(), "proxy-authorization");
        assert!(!format!("{header:?}").contains("dTpw"));
        assert!(AuthHeader::new(ChallengeTarget::Target, "bad\nvalue").is_err());
    }
}
