//! Request-side cookie attachment and response-side cookie ingestion.

use std::sync::Arc;
use std::time::SystemTime;

use reqwest::Method;
use reqwest::header::HeaderName;
use tracing::{debug, instrument, warn};

use super::spec::{CookieSpec, CookieSpecRegistry, DEFAULT_COOKIE_POLICY, SetCookieKind};
use super::{Cookie, CookieOrigin, CookieStore};
use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::http::{HttpHost, HttpRequest, HttpResponse, headers};

/// Attaches stored cookies to requests and stores cookies set by responses.
///
/// The agent is shared by every exchange of a client. Per-exchange values
/// (resolved spec, cookie origin) travel in the [`ExchangeContext`].
#[derive(Clone)]
pub struct CookieAgent {
    store: Arc<dyn CookieStore>,
    registry: Arc<CookieSpecRegistry>,
    default_policy: String,
}

impl std::fmt::Debug for CookieAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieAgent")
            .field("registry", &self.registry.names())
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

impl CookieAgent {
    /// Creates an agent over `store` with the default registry and policy.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self {
            store,
            registry: Arc::new(CookieSpecRegistry::default()),
            default_policy: DEFAULT_COOKIE_POLICY.to_string(),
        }
    }

    /// Replaces the spec registry.
    #[must_use]
    pub fn with_registry(mut self, registry: CookieSpecRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Policy used when the request configuration names none.
    #[must_use]
    pub fn with_default_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_policy = policy.into();
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CookieStore> {
        &self.store
    }

    #[must_use]
    pub fn default_policy(&self) -> &str {
        &self.default_policy
    }

    /// Adds `Cookie` headers for every stored cookie matching the request.
    ///
    /// The target host comes from the context, falling back to the request
    /// URI; the route must already be set. The resolved spec and cookie
    /// origin are written back to the context for [`Self::ingest_with_context`].
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::UnsupportedPolicy`] when the effective policy
    /// is not registered.
    #[instrument(level = "debug", skip_all, fields(uri = %request.uri()))]
    pub fn attach(
        &self,
        request: &mut HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<(), ExchangeError> {
        if request.method() == Method::CONNECT {
            return Ok(());
        }

        let Some(target) = ctx
            .target_host
            .clone()
            .or_else(|| HttpHost::from_url(request.uri()))
        else {
            debug!("target host not set in the context");
            return Ok(());
        };
        let Some(route) = ctx.route.as_ref() else {
            debug!("connection route not set in the context");
            return Ok(());
        };

        let policy = ctx
            .config
            .cookie_spec()
            .unwrap_or(&self.default_policy)
            .to_string();
        let spec = self
            .registry
            .lookup(&policy)
            .ok_or_else(|| ExchangeError::unsupported_policy(&policy))?;
        debug!(policy = %policy, "cookie spec selected");

        let port = target
            .port()
            .or_else(|| route.target_host().port())
            .unwrap_or(0);
        let path = match request.path() {
            "" => "/",
            path => path,
        };
        let origin = CookieOrigin::new(target.hostname(), port, path, route.is_secure());

        let matched = self.matching_cookies(spec.as_ref(), &origin);
        if !matched.is_empty() {
            for value in spec.format_cookies(&matched) {
                request.add_header(headers::COOKIE, value);
            }
        }

        let version = spec.version();
        if version > 0 {
            let needs_version_header = matched
                .iter()
                .any(|cookie| !cookie.is_set_cookie2() || cookie.version() != version);
            if needs_version_header {
                if let Some(value) = spec.version_header() {
                    request.add_header(headers::COOKIE2, value);
                }
            }
        }

        ctx.cookie_spec = Some(spec);
        ctx.cookie_origin = Some(origin);
        Ok(())
    }

    /// Unexpired store cookies accepted by the spec, in store order.
    fn matching_cookies(&self, spec: &dyn CookieSpec, origin: &CookieOrigin) -> Vec<Cookie> {
        let now = SystemTime::now();
        self.store
            .cookies()
            .into_iter()
            .filter(|cookie| {
                if cookie.is_expired(now) {
                    debug!(name = %cookie.name(), domain = %cookie.domain(), "cookie expired");
                    return false;
                }
                let matched = spec.matches(cookie, origin);
                if matched {
                    debug!(cookie = %cookie.summary(), origin = %origin, "cookie match");
                }
                matched
            })
            .collect()
    }

    /// Stores the cookies set by `response`.
    ///
    /// `Set-Cookie2` headers are only processed by versioned specs. Header
    /// parse failures and rejected cookies are logged and skipped. Returns
    /// the number of cookies accepted.
    #[instrument(level = "debug", skip_all, fields(origin = %origin))]
    pub fn ingest(
        &self,
        response: &HttpResponse,
        spec: &dyn CookieSpec,
        origin: &CookieOrigin,
    ) -> usize {
        let mut accepted = self.process_headers(
            response,
            &headers::SET_COOKIE,
            SetCookieKind::SetCookie,
            spec,
            origin,
        );
        if spec.version() > 0 {
            accepted += self.process_headers(
                response,
                &headers::SET_COOKIE2,
                SetCookieKind::SetCookie2,
                spec,
                origin,
            );
        }
        accepted
    }

    /// [`Self::ingest`] with the spec and origin recorded by [`Self::attach`].
    pub fn ingest_with_context(&self, response: &HttpResponse, ctx: &ExchangeContext) -> usize {
        match (&ctx.cookie_spec, &ctx.cookie_origin) {
            (Some(spec), Some(origin)) => self.ingest(response, spec.as_ref(), origin),
            (None, _) => {
                debug!("cookie spec not specified in the exchange context");
                0
            }
            (_, None) => {
                debug!("cookie origin not specified in the exchange context");
                0
            }
        }
    }

    fn process_headers(
        &self,
        response: &HttpResponse,
        name: &HeaderName,
        kind: SetCookieKind,
        spec: &dyn CookieSpec,
        origin: &CookieOrigin,
    ) -> usize {
        let mut accepted = 0;
        for value in response.headers().get_all(name) {
            let Ok(value) = value.to_str() else {
                warn!(header = %name, "cookie header is not valid text; skipped");
                continue;
            };
            let cookies = match spec.parse(kind, value, origin) {
                Ok(cookies) => cookies,
                Err(e) => {
                    warn!(header = %name, error = %e, "invalid cookie header");
                    continue;
                }
            };
            for cookie in cookies {
                match spec.validate(&cookie, origin) {
                    Ok(()) => {
                        debug!(cookie = %cookie.summary(), "cookie accepted");
                        self.store.add_cookie(cookie);
                        accepted += 1;
                    }
                    Err(e) => {
                        warn!(name = %cookie.name(), error = %e, "cookie rejected");
                    }
                }
            }
        }
        accepted
    }
}
