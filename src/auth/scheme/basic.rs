//! Basic authentication (RFC 7617).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{AuthHeader, AuthScheme};
use crate::auth::{AuthChallenge, AuthError, ChallengeTarget, Credentials};
use crate::http::HttpRequest;

/// `Basic base64(user:password)`.
///
/// Complete as soon as a challenge was processed: a second challenge after
/// credentials were sent means they were refused.
#[derive(Debug, Default)]
pub struct BasicScheme {
    target: Option<ChallengeTarget>,
    realm: Option<String>,
    complete: bool,
}

impl BasicScheme {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthScheme for BasicScheme {
    fn scheme_name(&self) -> &str {
        "basic"
    }

    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), AuthError> {
        self.target = Some(challenge.target());
        self.realm = challenge.param("realm").map(str::to_string);
        self.complete = true;
        Ok(())
    }

    fn authenticate(
        &mut self,
        credentials: &Credentials,
        _request: &HttpRequest,
    ) -> Result<AuthHeader, AuthError> {
        let token = STANDARD.encode(format!(
            "{}:{}",
            credentials.principal(),
            credentials.password()
        ));
        AuthHeader::new(
            self.target.unwrap_or(ChallengeTarget::Target),
            &format!("Basic {token}"),
        )
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_connection_based(&self) -> bool {
        false
    }

    fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}
