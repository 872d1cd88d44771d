//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Run one HTTP exchange with cookie, authentication and redirect handling.
///
/// Prints the final status, final URL and the cookies stored during the
/// exchange, followed by the response body.
#[derive(Parser, Debug)]
#[command(name = "http-exchange")]
#[command(author, version, about)]
pub struct Args {
    /// Request URL
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Target credentials as `user:password`
    #[arg(short = 'u', long, value_name = "USER:PASSWORD")]
    pub user: Option<String>,

    /// NTLM domain for the target credentials (switches them to NT credentials)
    #[arg(long, value_name = "DOMAIN")]
    pub ntlm_domain: Option<String>,

    /// Route requests through this HTTP proxy
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Proxy credentials as `user:password`
    #[arg(long, value_name = "USER:PASSWORD")]
    pub proxy_user: Option<String>,

    /// Netscape cookies.txt file loaded before the exchange
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Cookie policy (best-match, compatibility, rfc2965, ignoreCookies)
    #[arg(long, value_name = "POLICY")]
    pub cookie_policy: Option<String>,

    /// Maximum redirects followed (0-1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub max_redirects: Option<u32>,

    /// Return redirect responses instead of following them
    #[arg(long)]
    pub no_redirects: bool,

    /// Configuration file (defaults to ~/.config/http-exchange/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Splits `user:password` at the first colon.
///
/// A value without a colon is a user name with an empty password.
#[must_use]
pub fn split_user_password(value: &str) -> (&str, &str) {
    value.split_once(':').unwrap_or((value, ""))
}

/// Splits `Name: value` into trimmed parts.
#[must_use]
pub fn split_header(value: &str) -> Option<(&str, &str)> {
    let (name, value) = value.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.com/";

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["http-exchange", URL]).unwrap();
        assert_eq!(args.url, URL);
        assert_eq!(args.method, "GET");
        assert!(args.headers.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert!(!args.no_redirects);
        assert_eq!(args.max_redirects, None);
    }

    #[test]
    fn test_cli_url_is_required() {
        let err = Args::try_parse_from(["http-exchange"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["http-exchange", "-v", URL]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["http-exchange", "-vv", URL]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_repeated_headers_collected() {
        let args = Args::try_parse_from([
            "http-exchange",
            "-H",
            "Accept: text/plain",
            "--header",
            "X-Trace: 1",
            URL,
        ])
        .unwrap();
        assert_eq!(args.headers, vec!["Accept: text/plain", "X-Trace: 1"]);
    }

    #[test]
    fn test_cli_auth_and_proxy_flags() {
        let args = Args::try_parse_from([
            "http-exchange",
            "-u",
            "alice:secret",
            "--ntlm-domain",
            "corp",
            "--proxy",
            "http://proxy:3128",
            "--proxy-user",
            "bob:pw",
            URL,
        ])
        .unwrap();
        assert_eq!(args.user.as_deref(), Some("alice:secret"));
        assert_eq!(args.ntlm_domain.as_deref(), Some("corp"));
        assert_eq!(args.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(args.proxy_user.as_deref(), Some("bob:pw"));
    }

    #[test]
    fn test_cli_max_redirects_over_max_rejected() {
        let err = Args::try_parse_from(["http-exchange", "--max-redirects", "1001", URL])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_max_redirects_zero_allowed() {
        let args =
            Args::try_parse_from(["http-exchange", "--max-redirects", "0", URL]).unwrap();
        assert_eq!(args.max_redirects, Some(0));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["http-exchange", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_split_user_password() {
        assert_eq!(split_user_password("alice:se:cret"), ("alice", "se:cret"));
        assert_eq!(split_user_password("alice"), ("alice", ""));
    }

    #[test]
    fn test_split_header() {
        assert_eq!(split_header("Accept:  text/plain "), Some(("Accept", "text/plain")));
        assert_eq!(split_header("no-colon"), None);
        assert_eq!(split_header(": value"), None);
    }
}
