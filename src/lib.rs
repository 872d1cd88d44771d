//! HTTP Exchange Core Library
//!
//! The stateful layer of an HTTP client: for every request and response of
//! a logical exchange (which may span several physical requests because of
//! redirects and authentication challenges) it attaches and stores cookies,
//! negotiates authentication with origin servers and proxies, and re-issues
//! requests when redirected.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cookie`] - Cookie policies, store and the request/response cookie agent
//! - [`auth`] - Challenge parsing, auth schemes (Basic, Digest, NTLM) and the negotiator
//! - [`redirect`] - Redirect strategy and the bounded redirect driver
//! - [`exec`] - Per-round protocol executor, `CONNECT` tunnelling and the reqwest transport
//! - [`client`] - [`ExchangeClient`] facade wiring the layers together
//! - [`http`] - Request/response, host and route types
//! - [`context`] - Per-exchange state and request configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod context;
pub mod cookie;
pub mod error;
pub mod exec;
pub mod http;
pub mod redirect;
mod user_agent;

// Re-export commonly used types
pub use auth::{
    AuthError, AuthNegotiator, AuthProtocolState, AuthScheme, AuthSchemeRegistry, AuthScope,
    AuthState, BasicCredentialsProvider, Credentials, CredentialsProvider, DefaultAuthStrategy,
    NtlmRetryLimits,
};
pub use client::{ExchangeClient, ExchangeClientBuilder};
pub use context::{DEFAULT_MAX_AUTH_ROUNDS, DEFAULT_MAX_REDIRECTS, ExchangeContext, RequestConfig};
pub use cookie::{
    BasicCookieStore, Cookie, CookieAgent, CookieSpecRegistry, CookieStore,
    DEFAULT_COOKIE_POLICY,
};
pub use error::ExchangeError;
pub use exec::{ProtocolExec, ProxyTunnel, ReqwestTransport, RequestExecutor, TransportConfig};
pub use http::{HttpHost, HttpRequest, HttpResponse, Route};
pub use redirect::{DefaultRedirectStrategy, RedirectDriver, RedirectStrategy};
