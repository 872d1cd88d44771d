//! HTTP values shared by the cookie, auth and redirect layers.
//!
//! Header names used literally by the exchange layer are collected in
//! [`headers`] so the request and response sides agree on spelling.

mod host;
mod message;
mod route;

pub use host::{HTTP_DEFAULT_PORT, HTTPS_DEFAULT_PORT, HttpHost};
pub use message::{BufferedBody, HttpRequest, HttpResponse, ResponseBody};
pub use route::{DefaultRouteResolver, Route, RouteResolver, TunnelType};

/// Header names consumed and produced by the exchange layer.
pub mod headers {
    use reqwest::header::HeaderName;

    pub use reqwest::header::{
        AUTHORIZATION, COOKIE, LOCATION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, SET_COOKIE,
        WWW_AUTHENTICATE,
    };

    /// `Cookie2` version advertisement (RFC 2965).
    pub const COOKIE2: HeaderName = HeaderName::from_static("cookie2");

    /// `Set-Cookie2` response header (RFC 2965).
    pub const SET_COOKIE2: HeaderName = HeaderName::from_static("set-cookie2");
}
