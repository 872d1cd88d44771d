//! Default User-Agent string for the reqwest transport.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/nicksrandall/http-exchange";

/// Default User-Agent sent by [`crate::exec::ReqwestTransport`].
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("http-exchange/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("http-exchange/")
                .and_then(|s| s.split(' ').next()),
            "UA must contain crate version: {ua}"
        );
    }

    #[test]
    fn test_user_agent_carries_project_url() {
        assert!(default_user_agent().contains(PROJECT_UA_URL));
    }
}
