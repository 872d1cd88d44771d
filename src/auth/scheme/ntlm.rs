//! NTLM: a connection-based, multi-round scheme.
//!
//! The handshake runs `Uninitiated -> ChallengeReceived -> Type1Sent ->
//! Type2Received -> Type3Sent`. Two bounded loops tolerate servers (usually
//! behind load balancers) that resend challenges out of turn: a token
//! challenge forces `Type2Received` while the challenge bound lasts, and
//! authenticating from `Failed` restarts at `ChallengeReceived` while the
//! authenticate bound lasts.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::{AuthHeader, AuthScheme, NtlmEngine, NtlmV2Engine};
use crate::auth::{AuthChallenge, AuthError, ChallengeTarget, Credentials};
use crate::http::HttpRequest;

/// Default bound on both retry loops.
pub const DEFAULT_NTLM_RETRIES: u32 = 10;

/// Handshake stage. Ordered: later stages compare greater.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NtlmStage {
    #[default]
    Uninitiated,
    ChallengeReceived,
    Type1Sent,
    Type2Received,
    Type3Sent,
    Failed,
}

impl fmt::Display for NtlmStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitiated => "UNINITIATED",
            Self::ChallengeReceived => "CHALLENGE_RECEIVED",
            Self::Type1Sent => "TYPE1_SENT",
            Self::Type2Received => "TYPE2_RECEIVED",
            Self::Type3Sent => "TYPE3_SENT",
            Self::Failed => "FAILED",
        })
    }
}

/// Bounds of the two self-healing loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtlmRetryLimits {
    max_challenges: u32,
    max_authentications: u32,
}

impl Default for NtlmRetryLimits {
    fn default() -> Self {
        Self {
            max_challenges: DEFAULT_NTLM_RETRIES,
            max_authentications: DEFAULT_NTLM_RETRIES,
        }
    }
}

impl NtlmRetryLimits {
    /// Token challenges that force `Type2Received` regardless of stage.
    #[must_use]
    pub fn with_max_challenges(mut self, max: u32) -> Self {
        self.max_challenges = max;
        self
    }

    /// Restarts allowed from `Failed`.
    #[must_use]
    pub fn with_max_authentications(mut self, max: u32) -> Self {
        self.max_authentications = max;
        self
    }

    #[must_use]
    pub fn max_challenges(&self) -> u32 {
        self.max_challenges
    }

    #[must_use]
    pub fn max_authentications(&self) -> u32 {
        self.max_authentications
    }
}

/// NTLM scheme instance; owns the handshake stage and last server token.
#[derive(Debug)]
pub struct NtlmScheme {
    engine: Arc<dyn NtlmEngine>,
    limits: NtlmRetryLimits,
    target: Option<ChallengeTarget>,
    stage: NtlmStage,
    challenge: String,
    challenge_count: u32,
    authenticate_count: u32,
}

impl NtlmScheme {
    #[must_use]
    pub fn new(engine: Arc<dyn NtlmEngine>, limits: NtlmRetryLimits) -> Self {
        Self {
            engine,
            limits,
            target: None,
            stage: NtlmStage::Uninitiated,
            challenge: String::new(),
            challenge_count: 0,
            authenticate_count: 0,
        }
    }

    #[must_use]
    pub fn stage(&self) -> NtlmStage {
        self.stage
    }
}

impl Default for NtlmScheme {
    fn default() -> Self {
        Self::new(Arc::new(NtlmV2Engine::new()), NtlmRetryLimits::default())
    }
}

impl AuthScheme for NtlmScheme {
    fn scheme_name(&self) -> &str {
        "ntlm"
    }

    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), AuthError> {
        self.target = Some(challenge.target());
        self.challenge = challenge.token().unwrap_or_default().to_string();
        debug!(stage = %self.stage, has_token = !self.challenge.is_empty(), "ntlm challenge");

        if self.challenge.is_empty() {
            self.stage = if self.stage == NtlmStage::Uninitiated {
                NtlmStage::ChallengeReceived
            } else {
                NtlmStage::Failed
            };
            return Ok(());
        }

        let count = self.challenge_count;
        self.challenge_count = self.challenge_count.saturating_add(1);
        if count < self.limits.max_challenges {
            if self.stage != NtlmStage::Type1Sent {
                info!(stage = %self.stage, retry = count + 1, "ntlm challenge out of turn, retrying");
            }
            self.stage = NtlmStage::Type2Received;
        } else if self.stage < NtlmStage::Type1Sent {
            self.stage = NtlmStage::Failed;
            return Err(AuthError::malformed_challenge(
                "out of sequence NTLM response message",
            ));
        } else if self.stage == NtlmStage::Type1Sent {
            self.stage = NtlmStage::Type2Received;
        }
        Ok(())
    }

    fn authenticate(
        &mut self,
        credentials: &Credentials,
        _request: &HttpRequest,
    ) -> Result<AuthHeader, AuthError> {
        let Credentials::Nt {
            user,
            password,
            domain,
            workstation,
        } = credentials
        else {
            return Err(AuthError::invalid_credentials(
                "credentials cannot be used for NTLM authentication",
            ));
        };

        if self.stage == NtlmStage::Failed
            && self.authenticate_count < self.limits.max_authentications
        {
            self.authenticate_count += 1;
            info!(retry = self.authenticate_count, "ntlm restarting after failure");
            self.stage = NtlmStage::ChallengeReceived;
        }

        let token = match self.stage {
            NtlmStage::Failed => {
                return Err(AuthError::authentication("NTLM authentication failed"));
            }
            NtlmStage::ChallengeReceived => {
                let token = self
                    .engine
                    .type1_message(domain.as_deref(), workstation.as_deref())?;
                self.stage = NtlmStage::Type1Sent;
                token
            }
            NtlmStage::Type2Received => {
                let token = self.engine.type3_message(
                    user,
                    password,
                    domain.as_deref(),
                    workstation.as_deref(),
                    &self.challenge,
                )?;
                self.stage = NtlmStage::Type3Sent;
                token
            }
            stage => {
                return Err(AuthError::authentication(format!(
                    "unexpected NTLM state: {stage}"
                )));
            }
        };
        debug!(stage = %self.stage, "ntlm message generated");
        AuthHeader::new(
            self.target.unwrap_or(ChallengeTarget::Target),
            &format!("NTLM {token}"),
        )
    }

    fn is_complete(&self) -> bool {
        matches!(self.stage, NtlmStage::Type3Sent | NtlmStage::Failed)
    }

    fn is_connection_based(&self) -> bool {
        true
    }
}
