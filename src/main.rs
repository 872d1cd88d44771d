//! CLI entry point for the http-exchange tool.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use exchange_core::cookie::{load_cookies_into_store, parse_netscape_cookies};
use exchange_core::{
    AuthScope, BasicCookieStore, Cookie, Credentials, ExchangeClient, ExchangeContext, HttpHost,
    HttpRequest, RequestConfig, TransportConfig,
};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

mod cli;
mod file_config;

use cli::{Args, split_header, split_user_password};
use file_config::FileConfig;

#[derive(Debug, Serialize)]
struct CookieReport {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    expires: Option<String>,
}

impl From<&Cookie> for CookieReport {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().to_string(),
            path: cookie.path().to_string(),
            secure: cookie.is_secure(),
            expires: cookie.expiry().map(httpdate::fmt_http_date),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExchangeReport {
    status: u16,
    url: String,
    redirects: Vec<String>,
    cookies: Vec<CookieReport>,
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only the exchange report.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = file_config::load_file_config(args.config.as_deref())?.unwrap_or_default();
    debug!(?file_config, "configuration loaded");

    let url = Url::parse(&args.url).with_context(|| format!("Invalid URL '{}'", args.url))?;
    let target = HttpHost::from_url(&url).ok_or_else(|| anyhow!("URL '{url}' has no host"))?;

    let client = build_client(&args, &file_config, &target)?;
    let request = build_request(&args, url)?;

    let mut ctx = ExchangeContext::new(request_config(&args, &file_config));
    let start_url = request.uri().clone();
    let mut response = client.execute_with_context(request, &mut ctx).await?;
    let body = response.bytes().await?;

    let final_url = ctx.redirect_locations.last().unwrap_or(&start_url);
    let report = ExchangeReport {
        status: response.status().as_u16(),
        url: final_url.to_string(),
        redirects: ctx.redirect_locations.iter().map(ToString::to_string).collect(),
        cookies: client
            .cookie_store()
            .cookies()
            .iter()
            .map(CookieReport::from)
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    info!(status = report.status, url = %report.url, "Exchange finished");

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    } else {
        print_text_report(&mut stdout, &report)?;
    }
    Ok(())
}

fn build_client(args: &Args, file_config: &FileConfig, target: &HttpHost) -> Result<ExchangeClient> {
    let mut transport = TransportConfig::default();
    if let Some(secs) = file_config.connect_timeout_secs {
        transport = transport.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = file_config.request_timeout_secs {
        transport = transport.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(user_agent) = &file_config.user_agent {
        transport = transport.with_user_agent(user_agent.clone());
    }

    let store = Arc::new(BasicCookieStore::new());
    if let Some(path) = args.cookies.as_ref().or(file_config.cookies_file.as_ref()) {
        let file = File::open(path)
            .with_context(|| format!("Failed to open cookies file '{}'", path.display()))?;
        let parsed = parse_netscape_cookies(BufReader::new(file))
            .with_context(|| format!("Failed to parse cookies file '{}'", path.display()))?;
        for (line, reason) in &parsed.warnings {
            warn!(line, reason = %reason, "Skipped malformed cookie line");
        }
        let loaded = load_cookies_into_store(parsed.cookies, store.as_ref());
        info!(loaded, path = %path.display(), "Loaded cookies");
    }

    let mut builder = ExchangeClient::builder()
        .transport_config(transport)
        .cookie_store(store);
    if let Some(policy) = args.cookie_policy.as_ref().or(file_config.cookie_policy.as_ref()) {
        builder = builder.cookie_policy(policy.clone());
    }

    let proxy = match args.proxy.as_ref().or(file_config.proxy.as_ref()) {
        Some(raw) => {
            let proxy_url =
                Url::parse(raw).with_context(|| format!("Invalid proxy URL '{raw}'"))?;
            let proxy = HttpHost::from_url(&proxy_url)
                .ok_or_else(|| anyhow!("Proxy URL '{raw}' has no host"))?;
            builder = builder.proxy(proxy.clone());
            Some(proxy)
        }
        None => None,
    };

    let client = builder.build()?;

    if let Some(user) = &args.user {
        let (name, password) = split_user_password(user);
        let credentials = match &args.ntlm_domain {
            Some(domain) => Credentials::nt(name, password, Some(domain.as_str()), None),
            None => Credentials::basic(name, password),
        };
        client.credentials().set_credentials(
            AuthScope::for_host(target.hostname(), Some(target.effective_port())),
            credentials,
        );
    }
    if let Some(proxy_user) = &args.proxy_user {
        let Some(proxy) = &proxy else {
            bail!("--proxy-user requires --proxy");
        };
        let (name, password) = split_user_password(proxy_user);
        client.credentials().set_credentials(
            AuthScope::for_host(proxy.hostname(), Some(proxy.effective_port())),
            Credentials::basic(name, password),
        );
    }
    Ok(client)
}

fn build_request(args: &Args, url: Url) -> Result<HttpRequest> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method '{}'", args.method))?;
    let mut request = HttpRequest::new(method, url);
    for raw in &args.headers {
        let Some((name, value)) = split_header(raw) else {
            bail!("Invalid header '{raw}': expected 'Name: value'");
        };
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name in '{raw}'"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid header value in '{raw}'"))?;
        request.add_header(name, value);
    }
    if let Some(data) = &args.data {
        request = request.with_body(data.clone().into_bytes());
    }
    Ok(request)
}

fn request_config(args: &Args, file_config: &FileConfig) -> RequestConfig {
    let mut config = RequestConfig::default();
    if let Some(max) = args.max_redirects.or(file_config.max_redirects) {
        config = config.with_max_redirects(max);
    }
    let follow = !args.no_redirects && file_config.follow_redirects.unwrap_or(true);
    config.with_redirects_enabled(follow)
}

fn print_text_report(out: &mut impl Write, report: &ExchangeReport) -> io::Result<()> {
    writeln!(out, "status: {}", report.status)?;
    writeln!(out, "url: {}", report.url)?;
    for location in &report.redirects {
        writeln!(out, "redirect: {location}")?;
    }
    for cookie in &report.cookies {
        writeln!(
            out,
            "cookie: {}={} (domain={}, path={})",
            cookie.name, cookie.value, cookie.domain, cookie.path
        )?;
    }
    writeln!(out)?;
    writeln!(out, "{}", report.body)
}
