//! Choosing which challenges to answer and with which credentials.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{
    AuthChallenge, AuthError, AuthOption, AuthScheme, AuthSchemeRegistry, AuthScope,
    ChallengeMap, ChallengeTarget, CredentialsProvider,
};
use crate::context::RequestConfig;
use crate::http::{HttpHost, HttpResponse};

/// Scheme preference when the request configuration names none.
pub const DEFAULT_SCHEME_PRIORITY: [&str; 3] = ["ntlm", "digest", "basic"];

/// Decides whether a response demands authentication and which
/// (scheme, credentials) options answer it.
///
/// Shared by concurrent exchanges.
pub trait AuthStrategy: Send + Sync {
    /// Which party this strategy negotiates with.
    fn challenge_target(&self) -> ChallengeTarget;

    /// Returns true when `response` demands authentication.
    fn is_authentication_requested(&self, host: &HttpHost, response: &HttpResponse) -> bool;

    /// Challenges of `response` by lower-cased scheme name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedChallenge`] when a challenge header is
    /// not valid text.
    fn challenges(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
    ) -> Result<ChallengeMap, AuthError>;

    /// Candidate options, most preferred first.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when options cannot be built at all; a
    /// single unusable challenge only drops that candidate.
    fn select(
        &self,
        challenges: &ChallengeMap,
        host: &HttpHost,
        config: &RequestConfig,
    ) -> Result<VecDeque<AuthOption>, AuthError>;

    /// A request passed with `scheme` without being challenged again.
    fn auth_succeeded(&self, host: &HttpHost, scheme: &dyn AuthScheme);

    /// Credentials that worked before were refused, or the negotiation broke.
    fn auth_failed(&self, host: &HttpHost, scheme: Option<&dyn AuthScheme>);
}

/// Strategy over an [`AuthSchemeRegistry`] and a [`CredentialsProvider`].
///
/// Remembers which scheme last succeeded per host and tries it first.
pub struct DefaultAuthStrategy {
    target: ChallengeTarget,
    registry: AuthSchemeRegistry,
    credentials: Arc<dyn CredentialsProvider>,
    cache: DashMap<HttpHost, String>,
}

impl DefaultAuthStrategy {
    /// Strategy for origin servers (`401`).
    #[must_use]
    pub fn target(registry: AuthSchemeRegistry, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self::new(ChallengeTarget::Target, registry, credentials)
    }

    /// Strategy for proxies (`407`).
    #[must_use]
    pub fn proxy(registry: AuthSchemeRegistry, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self::new(ChallengeTarget::Proxy, registry, credentials)
    }

    fn new(
        target: ChallengeTarget,
        registry: AuthSchemeRegistry,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            target,
            registry,
            credentials,
            cache: DashMap::new(),
        }
    }

    /// Scheme that last succeeded against `host`.
    #[must_use]
    pub fn cached_scheme(&self, host: &HttpHost) -> Option<String> {
        self.cache
            .get(&host.normalized())
            .map(|entry| entry.value().clone())
    }

    fn priority(&self, host: &HttpHost, config: &RequestConfig) -> Vec<String> {
        let configured = match self.target {
            ChallengeTarget::Target => config.target_preferred_auth_schemes(),
            ChallengeTarget::Proxy => config.proxy_preferred_auth_schemes(),
        };
        let mut order: Vec<String> = match configured {
            Some(schemes) => schemes.iter().map(|s| s.to_ascii_lowercase()).collect(),
            None => DEFAULT_SCHEME_PRIORITY.iter().map(|s| (*s).to_string()).collect(),
        };
        if let Some(cached) = self.cached_scheme(host) {
            if let Some(pos) = order.iter().position(|name| *name == cached) {
                let name = order.remove(pos);
                order.insert(0, name);
            }
        }
        order
    }

    fn option_for(
        &self,
        challenge: &AuthChallenge,
        host: &HttpHost,
    ) -> Result<Option<AuthOption>, AuthError> {
        let Some(mut scheme) = self.registry.create(challenge.scheme()) else {
            debug!(scheme = challenge.scheme(), "auth scheme not supported");
            return Ok(None);
        };
        scheme.process_challenge(challenge)?;
        let scope = AuthScope::new(
            Some(host.hostname()),
            Some(host.effective_port()),
            scheme.realm(),
            Some(scheme.scheme_name()),
        );
        match self.credentials.credentials(&scope) {
            Some(credentials) => Ok(Some(AuthOption::new(scheme, credentials))),
            None => {
                debug!(scope = %scope, "no credentials for challenge");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for DefaultAuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultAuthStrategy")
            .field("target", &self.target)
            .field("registry", &self.registry)
            .field("cached_hosts", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl AuthStrategy for DefaultAuthStrategy {
    fn challenge_target(&self) -> ChallengeTarget {
        self.target
    }

    fn is_authentication_requested(&self, _host: &HttpHost, response: &HttpResponse) -> bool {
        response.status() == self.target.unauthorized_status()
    }

    fn challenges(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
    ) -> Result<ChallengeMap, AuthError> {
        let mut map = ChallengeMap::new();
        for value in response.headers().get_all(self.target.challenge_header()) {
            let text = value.to_str().map_err(|_| {
                AuthError::malformed_challenge("challenge header is not valid text")
            })?;
            match AuthChallenge::parse(self.target, text) {
                Ok(challenge) => {
                    map.entry(challenge.scheme().to_string()).or_insert(challenge);
                }
                Err(e) => warn!(host = %host.to_host_string(), error = %e, "skipping challenge"),
            }
        }
        Ok(map)
    }

    fn select(
        &self,
        challenges: &ChallengeMap,
        host: &HttpHost,
        config: &RequestConfig,
    ) -> Result<VecDeque<AuthOption>, AuthError> {
        let mut options = VecDeque::new();
        for name in self.priority(host, config) {
            let Some(challenge) = challenges.get(&name) else {
                continue;
            };
            match self.option_for(challenge, host) {
                Ok(Some(option)) => options.push_back(option),
                Ok(None) => {}
                Err(e) => warn!(scheme = %name, error = %e, "challenge rejected by scheme"),
            }
        }
        debug!(auth_target = %self.target, options = options.len(), "auth options selected");
        Ok(options)
    }

    fn auth_succeeded(&self, host: &HttpHost, scheme: &dyn AuthScheme) {
        if scheme.is_complete() && !scheme.is_connection_based() {
            debug!(host = %host.to_host_string(), scheme = scheme.scheme_name(), "caching auth scheme");
            self.cache
                .insert(host.normalized(), scheme.scheme_name().to_string());
        }
    }

    fn auth_failed(&self, host: &HttpHost, scheme: Option<&dyn AuthScheme>) {
        if self.cache.remove(&host.normalized()).is_some() {
            debug!(
                host = %host.to_host_string(),
                scheme = scheme.map(AuthScheme::scheme_name),
                "evicted cached auth scheme"
            );
        }
    }
}
