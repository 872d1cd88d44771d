//! HTTP authentication: challenges, schemes and the negotiation state
//! machine.
//!
//! One [`AuthState`] exists per negotiation target (origin server and
//! proxy) per exchange. The [`AuthNegotiator`] advances it, asking an
//! [`AuthStrategy`] which challenges to answer and with which
//! [`Credentials`].

mod challenge;
mod credentials;
mod error;
mod negotiator;
mod scheme;
mod state;
mod strategy;

pub use challenge::{AuthChallenge, ChallengeMap, ChallengeTarget};
pub use credentials::{AuthScope, BasicCredentialsProvider, Credentials, CredentialsProvider};
pub use error::AuthError;
pub use negotiator::AuthNegotiator;
pub use scheme::{
    AuthHeader, AuthScheme, AuthSchemeFactory, AuthSchemeRegistry, BasicScheme, DigestScheme,
    NtlmEngine, NtlmRetryLimits, NtlmScheme, NtlmStage, NtlmV2Engine, scheme_factory,
};
pub use state::{AuthOption, AuthProtocolState, AuthState};
pub use strategy::{AuthStrategy, DEFAULT_SCHEME_PRIORITY, DefaultAuthStrategy};
