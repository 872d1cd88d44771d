//! Routes and route resolution.
//!
//! Route *planning* (proxy selection rules, PAC files, DNS) is somebody
//! else's job; an exchange only asks a [`RouteResolver`] for the route to a
//! target and reads the result.

use std::fmt;

use tracing::debug;

use super::{HttpHost, HttpRequest};
use crate::context::ExchangeContext;
use crate::error::ExchangeError;

/// Whether traffic to the target is tunnelled through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelType {
    /// Requests are sent directly, or forwarded by the proxy in absolute form.
    Plain,
    /// A `CONNECT` tunnel is established through the proxy first.
    Tunnelled,
}

/// The path an exchange's requests take to the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    target: HttpHost,
    proxy: Option<HttpHost>,
    secure: bool,
    tunnel: TunnelType,
}

impl Route {
    /// Direct route to `target`.
    #[must_use]
    pub fn direct(target: HttpHost) -> Self {
        let secure = target.is_secure();
        Self {
            target,
            proxy: None,
            secure,
            tunnel: TunnelType::Plain,
        }
    }

    /// Route through `proxy`; secure targets are tunnelled.
    #[must_use]
    pub fn via_proxy(target: HttpHost, proxy: HttpHost) -> Self {
        let secure = target.is_secure();
        let tunnel = if secure {
            TunnelType::Tunnelled
        } else {
            TunnelType::Plain
        };
        Self {
            target,
            proxy: Some(proxy),
            secure,
            tunnel,
        }
    }

    /// Explicit construction, used when the tunnel decision is made elsewhere.
    #[must_use]
    pub fn new(target: HttpHost, proxy: Option<HttpHost>, secure: bool, tunnel: TunnelType) -> Self {
        Self {
            target,
            proxy,
            secure,
            tunnel,
        }
    }

    #[must_use]
    pub fn target_host(&self) -> &HttpHost {
        &self.target
    }

    #[must_use]
    pub fn proxy_host(&self) -> Option<&HttpHost> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn tunnel_type(&self) -> TunnelType {
        self.tunnel
    }

    #[must_use]
    pub fn is_tunnelled(&self) -> bool {
        self.tunnel == TunnelType::Tunnelled
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.proxy {
            Some(proxy) if self.is_tunnelled() => write!(f, "{proxy} -> (tunnel) {}", self.target),
            Some(proxy) => write!(f, "{proxy} -> {}", self.target),
            None => write!(f, "{}", self.target),
        }
    }
}

/// Computes the route for a (possibly new) target host.
pub trait RouteResolver: Send + Sync {
    /// Returns the route requests to `target` should take.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when no route can be determined.
    fn resolve(
        &self,
        target: &HttpHost,
        request: &HttpRequest,
        ctx: &ExchangeContext,
    ) -> Result<Route, ExchangeError>;
}

/// Resolver with a single optional proxy for every target.
#[derive(Debug, Clone, Default)]
pub struct DefaultRouteResolver {
    proxy: Option<HttpHost>,
}

impl DefaultRouteResolver {
    /// Direct routes only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every target through `proxy`.
    #[must_use]
    pub fn with_proxy(proxy: HttpHost) -> Self {
        Self { proxy: Some(proxy) }
    }
}

impl RouteResolver for DefaultRouteResolver {
    fn resolve(
        &self,
        target: &HttpHost,
        _request: &HttpRequest,
        _ctx: &ExchangeContext,
    ) -> Result<Route, ExchangeError> {
        if target.hostname().is_empty() {
            return Err(ExchangeError::protocol("target host name is empty"));
        }
        let target = target.normalized();
        let route = match &self.proxy {
            Some(proxy) => Route::via_proxy(target, proxy.normalized()),
            None => Route::direct(target),
        };
        debug!(route = %route, "route resolved");
        Ok(route)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_default_resolver_fills_port_and_security() {
        let resolver = DefaultRouteResolver::new();
        let request = HttpRequest::get(Url::parse("https://a.example/").unwrap());
        let ctx = ExchangeContext::default();
        let route = resolver
            .resolve(&HttpHost::new("https", "a.example", None), &request, &ctx)
            .unwrap();
        assert_eq!(route.target_host().port(), Some(443));
        assert!(route.is_secure());
        assert!(!route.is_tunnelled());
        assert!(route.proxy_host().is_none());
    }

    #[test]
    fn test_secure_target_through_proxy_is_tunnelled() {
        let resolver = DefaultRouteResolver::with_proxy(HttpHost::new("http", "proxy", Some(3128)));
        let request = HttpRequest::get(Url::parse("https://a.example/").unwrap());
        let ctx = ExchangeContext::default();
        let route = resolver
            .resolve(&HttpHost::new("https", "a.example", None), &request, &ctx)
            .unwrap();
        assert!(route.is_tunnelled());
        assert_eq!(route.proxy_host().unwrap().hostname(), "proxy");

        let plain = resolver
            .resolve(&HttpHost::http("b.example"), &request, &ctx)
            .unwrap();
        assert_eq!(plain.tunnel_type(), TunnelType::Plain);
    }
}
