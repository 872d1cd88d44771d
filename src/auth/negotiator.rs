//! The per-target authentication state machine.
//!
//! [`AuthNegotiator`] owns no state: every call operates on the
//! [`AuthState`] of one negotiation target (origin or proxy), consulting an
//! [`AuthStrategy`] for what the response asks for and what to offer.

use tracing::{debug, error, instrument, warn};

use super::{AuthError, AuthHeader, AuthProtocolState, AuthState, AuthStrategy};
use crate::context::RequestConfig;
use crate::http::{HttpHost, HttpRequest, HttpResponse};

/// Drives [`AuthState`] transitions for challenges and responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthNegotiator;

impl AuthNegotiator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns true when `response` demands authentication.
    ///
    /// A response that passes without a challenge settles an ongoing
    /// negotiation as successful. A challenge after success means the
    /// cached credentials no longer work.
    #[instrument(level = "debug", skip_all, fields(host = %host.to_host_string(), state = %state.state()))]
    pub fn is_authentication_requested(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        state: &mut AuthState,
    ) -> bool {
        if strategy.is_authentication_requested(host, response) {
            debug!("authentication required");
            if state.state() == AuthProtocolState::Success {
                strategy.auth_failed(host, state.scheme());
            }
            return true;
        }

        match state.state() {
            AuthProtocolState::Challenged | AuthProtocolState::Handshake => {
                debug!("authentication succeeded");
                state.set_state(AuthProtocolState::Success);
                if let Some(scheme) = state.scheme() {
                    strategy.auth_succeeded(host, scheme);
                }
            }
            AuthProtocolState::Success => {}
            _ => state.set_state(AuthProtocolState::Unchallenged),
        }
        false
    }

    /// Processes the challenges of `response`.
    ///
    /// Returns true when the request should be retried with a new
    /// credential header, false to give up and hand the response back.
    /// Malformed challenges end the negotiation; they are never raised.
    #[instrument(level = "debug", skip_all, fields(host = %host.to_host_string(), state = %state.state()))]
    pub fn handle_auth_challenge(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        state: &mut AuthState,
        config: &RequestConfig,
    ) -> bool {
        match Self::process_challenges(host, response, strategy, state, config) {
            Ok(retry) => retry,
            Err(e) => {
                warn!(error = %e, "malformed challenge, giving up");
                state.reset();
                false
            }
        }
    }

    fn process_challenges(
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        state: &mut AuthState,
        config: &RequestConfig,
    ) -> Result<bool, AuthError> {
        let challenges = strategy.challenges(host, response)?;
        if challenges.is_empty() {
            debug!("response carries no challenge");
            return Ok(false);
        }

        match state.state() {
            AuthProtocolState::Failure => return Ok(false),
            AuthProtocolState::Success => state.reset(),
            AuthProtocolState::Challenged | AuthProtocolState::Handshake
                if state.scheme().is_none() =>
            {
                debug!("challenged without an active scheme");
                strategy.auth_failed(host, None);
                state.reset();
                state.set_state(AuthProtocolState::Failure);
                return Ok(false);
            }
            _ => {}
        }

        if let Some(scheme) = state.scheme_mut() {
            let name = scheme.scheme_name().to_ascii_lowercase();
            if let Some(challenge) = challenges.get(&name) {
                scheme.process_challenge(challenge)?;
                if scheme.is_complete() {
                    debug!(scheme = %name, "authentication failed");
                    strategy.auth_failed(host, state.scheme());
                    state.reset();
                    state.set_state(AuthProtocolState::Failure);
                    return Ok(false);
                }
                state.set_state(AuthProtocolState::Handshake);
                return Ok(true);
            }
            debug!(scheme = %name, "scheme no longer offered, selecting again");
            state.reset();
        }

        let options = strategy.select(&challenges, host, config)?;
        if options.is_empty() {
            return Ok(false);
        }
        state.update_options(options);
        state.set_state(AuthProtocolState::Challenged);
        Ok(true)
    }

    /// Produces the credential header for `request`, if one is due.
    ///
    /// Pending options are tried in order; an option whose scheme cannot
    /// respond is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Authentication`] when the state requires an
    /// active scheme and none is installed.
    #[instrument(level = "debug", skip_all, fields(state = %state.state()))]
    pub fn generate_auth_response(
        &self,
        request: &HttpRequest,
        state: &mut AuthState,
    ) -> Result<Option<AuthHeader>, AuthError> {
        match state.state() {
            AuthProtocolState::Failure => return Ok(None),
            AuthProtocolState::Success => {
                let scheme = state
                    .scheme()
                    .ok_or_else(|| AuthError::authentication("auth scheme is not set"))?;
                if scheme.is_connection_based() {
                    return Ok(None);
                }
            }
            AuthProtocolState::Challenged => {
                if let Some(mut options) = state.take_options() {
                    while let Some(option) = options.pop_front() {
                        let (scheme, credentials) = option.into_parts();
                        let name = scheme.scheme_name().to_string();
                        state.update(scheme, credentials);
                        debug!(scheme = %name, "generating response to challenge");
                        let Some((scheme, credentials)) = state.scheme_and_credentials() else {
                            continue;
                        };
                        match scheme.authenticate(credentials, request) {
                            Ok(header) => return Ok(Some(header)),
                            Err(e) if e.is_authentication() => {
                                warn!(scheme = %name, error = %e, "auth option failed");
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    return Ok(None);
                }
                if state.scheme().is_none() {
                    return Err(AuthError::authentication("auth scheme is not set"));
                }
            }
            _ => {}
        }

        let Some((scheme, credentials)) = state.scheme_and_credentials() else {
            return Ok(None);
        };
        match scheme.authenticate(credentials, request) {
            Ok(header) => Ok(Some(header)),
            Err(e) => {
                error!(scheme = scheme.scheme_name(), error = %e, "authentication error");
                Ok(None)
            }
        }
    }

    /// Sets the credential header on `request` when one is due, replacing
    /// any previous one.
    ///
    /// # Errors
    ///
    /// Propagates [`AuthNegotiator::generate_auth_response`] errors.
    pub fn apply_auth_response(
        &self,
        request: &mut HttpRequest,
        state: &mut AuthState,
    ) -> Result<(), AuthError> {
        if let Some(header) = self.generate_auth_response(request, state)? {
            let (name, value) = header.into_parts();
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;
    use reqwest::header::HeaderValue;
    use url::Url;

    use super::*;
    use crate::auth::{
        AuthChallenge, AuthOption, AuthScheme, AuthSchemeRegistry, AuthScope,
        BasicCredentialsProvider, BasicScheme, ChallengeMap, ChallengeTarget, Credentials,
        CredentialsProvider, DefaultAuthStrategy, NtlmRetryLimits, NtlmScheme,
    };
    use crate::http::headers;

    /// Counts strategy callbacks on top of the default strategy.
    struct RecordingStrategy {
        inner: DefaultAuthStrategy,
        succeeded: AtomicUsize,
        failed: AtomicUsize,
    }

    impl RecordingStrategy {
        fn new(credentials: Credentials) -> Self {
            let provider = BasicCredentialsProvider::new();
            provider.set_credentials(AuthScope::any(), credentials);
            Self {
                inner: DefaultAuthStrategy::target(AuthSchemeRegistry::default(), Arc::new(provider)),
                succeeded: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            }
        }
    }

    impl AuthStrategy for RecordingStrategy {
        fn challenge_target(&self) -> ChallengeTarget {
            self.inner.challenge_target()
        }

        fn is_authentication_requested(&self, host: &HttpHost, response: &HttpResponse) -> bool {
            self.inner.is_authentication_requested(host, response)
        }

        fn challenges(
            &self,
            host: &HttpHost,
            response: &HttpResponse,
        ) -> Result<ChallengeMap, AuthError> {
            self.inner.challenges(host, response)
        }

        fn select(
            &self,
            challenges: &ChallengeMap,
            host: &HttpHost,
            config: &RequestConfig,
        ) -> Result<VecDeque<AuthOption>, AuthError> {
            self.inner.select(challenges, host, config)
        }

        fn auth_succeeded(&self, host: &HttpHost, scheme: &dyn AuthScheme) {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
            self.inner.auth_succeeded(host, scheme);
        }

        fn auth_failed(&self, host: &HttpHost, scheme: Option<&dyn AuthScheme>) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            self.inner.auth_failed(host, scheme);
        }
    }

    fn host() -> HttpHost {
        HttpHost::http("a.example")
    }

    fn request() -> HttpRequest {
        HttpRequest::get(Url::parse("http://a.example/private").unwrap())
    }

    fn challenged(values: &[&'static str]) -> HttpResponse {
        values.iter().fold(
            HttpResponse::new(StatusCode::UNAUTHORIZED),
            |response, value| {
                response.with_header(headers::WWW_AUTHENTICATE, HeaderValue::from_static(value))
            },
        )
    }

    #[test]
    fn test_basic_round_trip_reaches_success() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::basic("u", "p"));
        let mut state = AuthState::new();
        let response = challenged(&[r#"Basic realm="r""#]);

        assert!(negotiator.is_authentication_requested(&host(), &response, &strategy, &mut state));
        assert!(negotiator.handle_auth_challenge(
            &host(),
            &response,
            &strategy,
            &mut state,
            &RequestConfig::default()
        ));
        assert_eq!(state.state(), AuthProtocolState::Challenged);

        let mut req = request();
        negotiator.apply_auth_response(&mut req, &mut state).unwrap();
        assert_eq!(req.headers().get(headers::AUTHORIZATION).unwrap(), "Basic dTpw");
        assert!(state.options().is_none());

        let ok = HttpResponse::new(StatusCode::OK);
        assert!(!negotiator.is_authentication_requested(&host(), &ok, &strategy, &mut state));
        assert_eq!(state.state(), AuthProtocolState::Success);
        assert_eq!(strategy.succeeded.load(Ordering::SeqCst), 1);

        // Success with a request-scoped scheme keeps sending credentials.
        let header = negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .unwrap();
        assert_eq!(header.value(), "Basic dTpw");
    }

    #[test]
    fn test_second_challenge_for_complete_scheme_fails() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::basic("u", "p"));
        let mut state = AuthState::new();
        let response = challenged(&[r#"Basic realm="r""#]);
        let config = RequestConfig::default();

        assert!(negotiator.handle_auth_challenge(&host(), &response, &strategy, &mut state, &config));
        negotiator.generate_auth_response(&request(), &mut state).unwrap();

        assert!(!negotiator.handle_auth_challenge(&host(), &response, &strategy, &mut state, &config));
        assert_eq!(state.state(), AuthProtocolState::Failure);
        assert_eq!(strategy.failed.load(Ordering::SeqCst), 1);
        assert!(negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .is_none());
        assert!(!negotiator.handle_auth_challenge(&host(), &response, &strategy, &mut state, &config));
    }

    #[test]
    fn test_challenged_without_scheme_fails() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::basic("u", "p"));
        let mut state = AuthState::new();
        state.set_state(AuthProtocolState::Handshake);
        let response = challenged(&[r#"Basic realm="r""#]);
        assert!(!negotiator.handle_auth_challenge(
            &host(),
            &response,
            &strategy,
            &mut state,
            &RequestConfig::default()
        ));
        assert_eq!(state.state(), AuthProtocolState::Failure);
        assert_eq!(strategy.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_challenge_or_no_options_gives_up() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::basic("u", "p"));
        let mut state = AuthState::new();
        let config = RequestConfig::default();
        assert!(!negotiator.handle_auth_challenge(
            &host(),
            &challenged(&[]),
            &strategy,
            &mut state,
            &config
        ));
        assert!(!negotiator.handle_auth_challenge(
            &host(),
            &challenged(&["Negotiate"]),
            &strategy,
            &mut state,
            &config
        ));
        assert_eq!(state.state(), AuthProtocolState::Unchallenged);
    }

    #[test]
    fn test_failing_option_is_skipped() {
        let negotiator = AuthNegotiator::new();
        let mut state = AuthState::new();
        let mut options = VecDeque::new();
        // NTLM refuses plain credentials; basic answers instead.
        let mut ntlm = NtlmScheme::default();
        ntlm.process_challenge(&AuthChallenge::parse(ChallengeTarget::Target, "NTLM").unwrap())
            .unwrap();
        options.push_back(AuthOption::new(Box::new(ntlm), Credentials::basic("u", "p")));
        options.push_back(AuthOption::new(Box::new(BasicScheme::new()), Credentials::basic("u", "p")));
        state.update_options(options);
        state.set_state(AuthProtocolState::Challenged);

        let header = negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .unwrap();
        assert_eq!(header.value(), "Basic dTpw");
        assert_eq!(state.scheme().map(|s| s.scheme_name()), Some("basic"));
    }

    #[test]
    fn test_missing_scheme_is_an_error() {
        let negotiator = AuthNegotiator::new();
        let mut state = AuthState::new();
        state.set_state(AuthProtocolState::Success);
        assert!(negotiator.generate_auth_response(&request(), &mut state).is_err());
        state.set_state(AuthProtocolState::Challenged);
        assert!(negotiator.generate_auth_response(&request(), &mut state).is_err());
        state.set_state(AuthProtocolState::Unchallenged);
        assert!(negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ntlm_handshake_and_connection_scoped_success() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::nt("u", "p", Some("corp"), None));
        let mut state = AuthState::new();
        let config = RequestConfig::default();

        assert!(negotiator.handle_auth_challenge(
            &host(),
            &challenged(&["NTLM"]),
            &strategy,
            &mut state,
            &config
        ));
        let type1 = negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .unwrap();
        assert!(type1.value().to_str().unwrap().starts_with("NTLM TlRMTVNTUAAB"));

        // Server answers with a Type 2 token; the scheme keeps going.
        let type2 = challenged(&["NTLM TlRMTVNTUAACAAAAAAAAAAAAAAABAgAAAQIDBAUGBwgAAAAAAAAAAAAAAAAwAAAA"]);
        assert!(negotiator.handle_auth_challenge(&host(), &type2, &strategy, &mut state, &config));
        assert_eq!(state.state(), AuthProtocolState::Handshake);
        let type3 = negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .unwrap();
        assert!(type3.value().to_str().unwrap().starts_with("NTLM TlRMTVNTUAAD"));

        let ok = HttpResponse::new(StatusCode::OK);
        assert!(!negotiator.is_authentication_requested(&host(), &ok, &strategy, &mut state));
        assert_eq!(state.state(), AuthProtocolState::Success);
        assert!(negotiator
            .generate_auth_response(&request(), &mut state)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_challenge_resets_state() {
        let negotiator = AuthNegotiator::new();
        let strategy = RecordingStrategy::new(Credentials::nt("u", "p", None, None));
        let mut state = AuthState::new();
        let mut ntlm = NtlmScheme::new(
            Arc::new(crate::auth::NtlmV2Engine::new()),
            NtlmRetryLimits::default().with_max_challenges(0),
        );
        ntlm.process_challenge(&AuthChallenge::parse(ChallengeTarget::Target, "NTLM").unwrap())
            .unwrap();
        state.update(Box::new(ntlm), Credentials::nt("u", "p", None, None));
        state.set_state(AuthProtocolState::Handshake);

        // A token before Type 1 was sent is out of sequence past the bound.
        assert!(!negotiator.handle_auth_challenge(
            &host(),
            &challenged(&["NTLM AAAA"]),
            &strategy,
            &mut state,
            &RequestConfig::default()
        ));
        assert_eq!(state.state(), AuthProtocolState::Unchallenged);
        assert!(state.scheme().is_none());
    }
}
