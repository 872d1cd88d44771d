//! Digest authentication (RFC 2617, with the SHA-256 algorithm of RFC 7616).

use std::fmt::Write as _;

use md5::{Digest, Md5};
use sha2::Sha256;
use tracing::debug;

use super::{AuthHeader, AuthScheme};
use crate::auth::{AuthChallenge, AuthError, ChallengeTarget, Credentials};
use crate::http::HttpRequest;

/// Hash function selected by the challenge's `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Parses an algorithm name, returning the hash and whether it is a
    /// session variant.
    fn parse(name: &str) -> Option<(Self, bool)> {
        match name.to_ascii_uppercase().as_str() {
            "MD5" => Some((Self::Md5, false)),
            "MD5-SESS" => Some((Self::Md5, true)),
            "SHA-256" => Some((Self::Sha256, false)),
            "SHA-256-SESS" => Some((Self::Sha256, true)),
            _ => None,
        }
    }

    fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 => to_hex(&Md5::digest(data.as_bytes())),
            Self::Sha256 => to_hex(&Sha256::digest(data.as_bytes())),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Inputs of one digest computation.
#[derive(Debug, Clone)]
struct DigestInput<'a> {
    user: &'a str,
    password: &'a str,
    realm: &'a str,
    nonce: &'a str,
    method: &'a str,
    uri: &'a str,
    algorithm: &'a str,
    qop: Option<&'a str>,
    nc: &'a str,
    cnonce: &'a str,
}

/// Computes the `response` value.
fn compute_response(input: &DigestInput<'_>) -> Result<String, AuthError> {
    let (hash, session) = DigestAlgorithm::parse(input.algorithm).ok_or_else(|| {
        AuthError::authentication(format!(
            "unsupported digest algorithm: {}",
            input.algorithm
        ))
    })?;

    let mut ha1 = hash.hash(&format!("{}:{}:{}", input.user, input.realm, input.password));
    if session {
        ha1 = hash.hash(&format!("{ha1}:{}:{}", input.nonce, input.cnonce));
    }
    let ha2 = hash.hash(&format!("{}:{}", input.method, input.uri));

    Ok(match input.qop {
        Some(qop) => hash.hash(&format!(
            "{ha1}:{}:{}:{}:{qop}:{ha2}",
            input.nonce, input.nc, input.cnonce
        )),
        None => hash.hash(&format!("{ha1}:{}:{ha2}", input.nonce)),
    })
}

fn create_cnonce() -> String {
    let bytes: [u8; 8] = rand::random();
    to_hex(&bytes)
}

/// Digest scheme state: last challenge parameters and nonce count.
#[derive(Debug, Default)]
pub struct DigestScheme {
    target: Option<ChallengeTarget>,
    params: Vec<(String, String)>,
    complete: bool,
    last_nonce: Option<String>,
    nonce_count: u32,
}

impl DigestScheme {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// `auth` when offered; `None` when the challenge has no `qop`.
    fn select_qop(&self) -> Result<Option<&'static str>, AuthError> {
        let Some(offered) = self.param("qop") else {
            return Ok(None);
        };
        if offered
            .split(',')
            .any(|qop| qop.trim().eq_ignore_ascii_case("auth"))
        {
            Ok(Some("auth"))
        } else {
            Err(AuthError::authentication(format!(
                "none of the qop methods is supported: {offered}"
            )))
        }
    }
}

impl AuthScheme for DigestScheme {
    fn scheme_name(&self) -> &str {
        "digest"
    }

    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), AuthError> {
        if challenge.params().is_empty() {
            return Err(AuthError::malformed_challenge(
                "digest challenge carries no parameters",
            ));
        }
        self.target = Some(challenge.target());
        self.params = challenge.params().to_vec();
        self.complete = true;
        Ok(())
    }

    fn authenticate(
        &mut self,
        credentials: &Credentials,
        request: &HttpRequest,
    ) -> Result<AuthHeader, AuthError> {
        let realm = self
            .param("realm")
            .ok_or_else(|| AuthError::authentication("missing realm in challenge"))?
            .to_string();
        let nonce = self
            .param("nonce")
            .ok_or_else(|| AuthError::authentication("missing nonce in challenge"))?
            .to_string();
        let algorithm = self.param("algorithm").map(str::to_string);
        let opaque = self.param("opaque").map(str::to_string);
        let qop = self.select_qop()?;

        if self.last_nonce.as_deref() == Some(nonce.as_str()) {
            self.nonce_count += 1;
        } else {
            self.nonce_count = 1;
            self.last_nonce = Some(nonce.clone());
        }
        let nc = format!("{:08x}", self.nonce_count);
        let cnonce = create_cnonce();
        let uri = request.request_target();
        let user = credentials.principal();

        let response = compute_response(&DigestInput {
            user: &user,
            password: credentials.password(),
            realm: &realm,
            nonce: &nonce,
            method: request.method().as_str(),
            uri: &uri,
            algorithm: algorithm.as_deref().unwrap_or("MD5"),
            qop,
            nc: &nc,
            cnonce: &cnonce,
        })?;
        debug!(realm = %realm, nc = %nc, "digest response computed");

        let mut value = format!(
            "Digest username=\"{user}\", realm=\"{realm}\", nonce=\"{nonce}\", uri=\"{uri}\", response=\"{response}\""
        );
        if let Some(qop) = qop {
            let _ = write!(value, ", qop={qop}, nc={nc}, cnonce=\"{cnonce}\"");
        }
        if let Some(algorithm) = &algorithm {
            let _ = write!(value, ", algorithm={algorithm}");
        }
        if let Some(opaque) = &opaque {
            let _ = write!(value, ", opaque=\"{opaque}\"");
        }
        AuthHeader::new(self.target.unwrap_or(ChallengeTarget::Target), &value)
    }

    /// A `stale=true` challenge means the nonce expired, not the credentials.
    fn is_complete(&self) -> bool {
        let stale = self
            .param("stale")
            .is_some_and(|stale| stale.eq_ignore_ascii_case("true"));
        self.complete && !stale
    }

    fn is_connection_based(&self) -> bool {
        false
    }

    fn realm(&self) -> Option<&str> {
        self.param("realm")
    }
}
