//! Credentials, their scopes, and the provider that maps one to the other.

use std::fmt;

use dashmap::DashMap;
use tracing::debug;

/// User credentials.
///
/// Passwords are redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Plain user name and password (Basic, Digest).
    UsernamePassword {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// Windows credentials (NTLM).
    Nt {
        /// User name without domain.
        user: String,
        /// Password.
        password: String,
        /// Upper-cased NT domain, if any.
        domain: Option<String>,
        /// Upper-cased workstation name, if any.
        workstation: Option<String>,
    },
}

impl Credentials {
    /// Creates user name / password credentials.
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Creates NT credentials; domain and workstation are upper-cased.
    #[must_use]
    pub fn nt(
        user: impl Into<String>,
        password: impl Into<String>,
        domain: Option<&str>,
        workstation: Option<&str>,
    ) -> Self {
        Self::Nt {
            user: user.into(),
            password: password.into(),
            domain: domain.map(str::to_uppercase),
            workstation: workstation.map(str::to_uppercase),
        }
    }

    /// User name without domain.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::UsernamePassword { user, .. } | Self::Nt { user, .. } => user,
        }
    }

    /// Password. Sensitive; never log the return value.
    #[must_use]
    pub fn password(&self) -> &str {
        match self {
            Self::UsernamePassword { password, .. } | Self::Nt { password, .. } => password,
        }
    }

    /// Principal name: `DOMAIN\user` for NT credentials with a domain.
    #[must_use]
    pub fn principal(&self) -> String {
        match self {
            Self::Nt {
                user,
                domain: Some(domain),
                ..
            } => format!("{domain}\\{user}"),
            _ => self.user().to_string(),
        }
    }
}

// Custom Debug impl that redacts the password.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword { user, .. } => f
                .debug_struct("UsernamePassword")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Nt {
                user,
                domain,
                workstation,
                ..
            } => f
                .debug_struct("Nt")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .field("domain", domain)
                .field("workstation", workstation)
                .finish(),
        }
    }
}

/// Where credentials apply. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AuthScope {
    host: Option<String>,
    port: Option<u16>,
    realm: Option<String>,
    scheme: Option<String>,
}

impl AuthScope {
    /// Scope matching every request.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Scope for one host and port, any realm and scheme.
    #[must_use]
    pub fn for_host(host: impl AsRef<str>, port: Option<u16>) -> Self {
        Self {
            host: Some(host.as_ref().to_ascii_lowercase()),
            port,
            ..Self::default()
        }
    }

    /// Fully specified scope. Host and scheme are compared case-insensitively.
    #[must_use]
    pub fn new(
        host: Option<&str>,
        port: Option<u16>,
        realm: Option<&str>,
        scheme: Option<&str>,
    ) -> Self {
        Self {
            host: host.map(str::to_ascii_lowercase),
            port,
            realm: realm.map(str::to_string),
            scheme: scheme.map(str::to_ascii_lowercase),
        }
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// How well `self` matches a concrete request scope.
    ///
    /// Returns `None` on a conflict; otherwise higher is more specific
    /// (host 8, port 4, realm 2, scheme 1).
    #[must_use]
    pub fn match_score(&self, request: &Self) -> Option<u8> {
        fn part<T: PartialEq>(mine: Option<&T>, theirs: Option<&T>, weight: u8) -> Option<u8> {
            match (mine, theirs) {
                (Some(a), Some(b)) if a == b => Some(weight),
                (Some(_), Some(_)) => None,
                _ => Some(0),
            }
        }
        Some(
            part(self.host.as_ref(), request.host.as_ref(), 8)?
                + part(self.port.as_ref(), request.port.as_ref(), 4)?
                + part(self.realm.as_ref(), request.realm.as_ref(), 2)?
                + part(self.scheme.as_ref(), request.scheme.as_ref(), 1)?,
        )
    }
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{} ", scheme.to_uppercase())?;
        }
        match &self.realm {
            Some(realm) => write!(f, "'{realm}'")?,
            None => f.write_str("<any realm>")?,
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        Ok(())
    }
}

/// Source of credentials for a scope.
///
/// Shared by concurrent exchanges; implementations synchronize internally.
pub trait CredentialsProvider: Send + Sync {
    /// Registers credentials for a scope, replacing existing ones.
    fn set_credentials(&self, scope: AuthScope, credentials: Credentials);

    /// Best credentials for a request scope, if any.
    fn credentials(&self, scope: &AuthScope) -> Option<Credentials>;

    /// Removes all credentials.
    fn clear(&self);
}

/// Concurrent map of scopes to credentials.
#[derive(Debug, Default)]
pub struct BasicCredentialsProvider {
    entries: DashMap<AuthScope, Credentials>,
}

impl BasicCredentialsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialsProvider for BasicCredentialsProvider {
    fn set_credentials(&self, scope: AuthScope, credentials: Credentials) {
        self.entries.insert(scope, credentials);
    }

    fn credentials(&self, scope: &AuthScope) -> Option<Credentials> {
        if let Some(exact) = self.entries.get(scope) {
            return Some(exact.value().clone());
        }
        let best = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .key()
                    .match_score(scope)
                    .map(|score| (score, entry.value().clone()))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, credentials)| credentials);
        if best.is_none() {
            debug!(scope = %scope, "no credentials for scope");
        }
        best
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::nt("user", "hunter2", Some("corp"), None);
        let debug_str = format!("{creds:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("CORP"));
    }

    #[test]
    fn test_principal_includes_domain() {
        assert_eq!(
            Credentials::nt("user", "pw", Some("corp"), None).principal(),
            "CORP\\user"
        );
        assert_eq!(Credentials::basic("user", "pw").principal(), "user");
    }

    #[test]
    fn test_match_score_prefers_specific_scope() {
        let request = AuthScope::new(Some("a.example"), Some(80), Some("r"), Some("basic"));
        assert_eq!(AuthScope::any().match_score(&request), Some(0));
        assert_eq!(AuthScope::for_host("A.example", Some(80)).match_score(&request), Some(12));
        assert_eq!(AuthScope::for_host("b.example", None).match_score(&request), None);
    }

    #[test]
    fn test_provider_picks_best_match() {
        let provider = BasicCredentialsProvider::new();
        provider.set_credentials(AuthScope::any(), Credentials::basic("anyone", "x"));
        provider.set_credentials(
            AuthScope::for_host("a.example", None),
            Credentials::basic("alice", "y"),
        );
        let request = AuthScope::new(Some("a.example"), Some(443), None, Some("digest"));
        assert_eq!(provider.credentials(&request).unwrap().user(), "alice");

        let other = AuthScope::new(Some("b.example"), Some(443), None, None);
        assert_eq!(provider.credentials(&other).unwrap().user(), "anyone");

        provider.clear();
        assert!(provider.credentials(&other).is_none());
    }
}
