//! Client facade wiring the exchange layers together.
//!
//! An [`ExchangeClient`] owns the collaborators shared by every exchange
//! (cookie store, credentials, auth strategies, route resolver, redirect
//! strategy, transport) and creates a fresh [`ExchangeContext`] per call.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::{
    AuthSchemeRegistry, BasicCredentialsProvider, CredentialsProvider, DefaultAuthStrategy,
};
use crate::context::{ExchangeContext, RequestConfig};
use crate::cookie::{BasicCookieStore, CookieAgent, CookieSpecRegistry, CookieStore};
use crate::error::ExchangeError;
use crate::exec::{ProtocolExec, ProxyTunnel, ReqwestTransport, RequestExecutor, TransportConfig};
use crate::http::{DefaultRouteResolver, HttpHost, HttpRequest, HttpResponse, RouteResolver};
use crate::redirect::{DefaultRedirectStrategy, RedirectDriver, RedirectStrategy};

/// Runs exchanges: cookies, authentication and redirects around a transport.
pub struct ExchangeClient {
    driver: RedirectDriver,
    route_resolver: Arc<dyn RouteResolver>,
    tunnel: ProxyTunnel,
    cookie_store: Arc<dyn CookieStore>,
    credentials: Arc<dyn CredentialsProvider>,
    default_config: RequestConfig,
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

impl ExchangeClient {
    /// Client over a default reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Transport`] when the reqwest client cannot be
    /// built.
    pub fn new() -> Result<Self, ExchangeError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> ExchangeClientBuilder {
        ExchangeClientBuilder::default()
    }

    /// Cookies shared by every exchange of this client.
    #[must_use]
    pub fn cookie_store(&self) -> &Arc<dyn CookieStore> {
        &self.cookie_store
    }

    /// Credentials shared by the target and proxy strategies.
    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialsProvider> {
        &self.credentials
    }

    /// Fresh context carrying the client's default request configuration.
    #[must_use]
    pub fn new_context(&self) -> ExchangeContext {
        ExchangeContext::new(self.default_config.clone())
    }

    /// Runs one exchange with the client's default configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::execute_with_context`].
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExchangeError> {
        let mut ctx = self.new_context();
        self.execute_with_context(request, &mut ctx).await
    }

    /// Runs one exchange with a caller-supplied context.
    ///
    /// The context is left as the exchange ended it, so callers can inspect
    /// redirect locations and negotiation states afterwards.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the request URI has no host, and
    /// otherwise any error of the redirect driver.
    #[instrument(level = "debug", skip_all, fields(method = %request.method(), uri = %request.uri()))]
    pub async fn execute_with_context(
        &self,
        request: HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        let target = HttpHost::from_url(request.uri())
            .ok_or_else(|| ExchangeError::protocol(format!("no target host in {}", request.uri())))?;
        let route = self.route_resolver.resolve(&target, &request, ctx)?;
        let response = self.driver.execute(route, request, ctx).await?;
        info!(
            status = %response.status(),
            redirects = ctx.redirect_locations.len(),
            "exchange complete"
        );
        Ok(response)
    }

    /// Opens a `CONNECT` tunnel to `target` through `proxy`.
    ///
    /// # Errors
    ///
    /// See [`ProxyTunnel::tunnel`].
    pub async fn tunnel(
        &self,
        proxy: &HttpHost,
        target: &HttpHost,
    ) -> Result<HttpResponse, ExchangeError> {
        let mut ctx = self.new_context();
        self.tunnel.tunnel(proxy, target, &mut ctx).await
    }
}

/// Builder for [`ExchangeClient`].
///
/// # Default Values
///
/// - transport: [`ReqwestTransport`] with [`TransportConfig::default`]
/// - cookie store: empty [`BasicCookieStore`]
/// - cookie policy: `best-match` from the default registry
/// - credentials: empty [`BasicCredentialsProvider`]
/// - auth schemes: Basic, Digest, NTLM
/// - route resolver: direct routes
/// - redirect strategy: [`DefaultRedirectStrategy`]
#[derive(Default)]
pub struct ExchangeClientBuilder {
    transport: Option<Arc<dyn RequestExecutor>>,
    transport_config: Option<TransportConfig>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    cookie_registry: Option<CookieSpecRegistry>,
    cookie_policy: Option<String>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    scheme_registry: Option<AuthSchemeRegistry>,
    route_resolver: Option<Arc<dyn RouteResolver>>,
    redirect_strategy: Option<Arc<dyn RedirectStrategy>>,
    default_config: RequestConfig,
}

impl ExchangeClientBuilder {
    /// Uses `transport` instead of a reqwest client.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn RequestExecutor>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Settings for the default reqwest transport.
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    #[must_use]
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    #[must_use]
    pub fn cookie_registry(mut self, registry: CookieSpecRegistry) -> Self {
        self.cookie_registry = Some(registry);
        self
    }

    /// Policy used when a request configuration names none.
    #[must_use]
    pub fn cookie_policy(mut self, policy: impl Into<String>) -> Self {
        self.cookie_policy = Some(policy.into());
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn scheme_registry(mut self, registry: AuthSchemeRegistry) -> Self {
        self.scheme_registry = Some(registry);
        self
    }

    /// Routes every request through `proxy`.
    #[must_use]
    pub fn proxy(mut self, proxy: HttpHost) -> Self {
        self.route_resolver = Some(Arc::new(DefaultRouteResolver::with_proxy(proxy)));
        self
    }

    #[must_use]
    pub fn route_resolver(mut self, resolver: Arc<dyn RouteResolver>) -> Self {
        self.route_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn redirect_strategy(mut self, strategy: Arc<dyn RedirectStrategy>) -> Self {
        self.redirect_strategy = Some(strategy);
        self
    }

    /// Configuration copied into every new context.
    #[must_use]
    pub fn default_config(mut self, config: RequestConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Transport`] when no transport was supplied
    /// and the reqwest client cannot be built.
    pub fn build(self) -> Result<ExchangeClient, ExchangeError> {
        let transport: Arc<dyn RequestExecutor> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                self.transport_config.unwrap_or_default(),
            )?),
        };
        let cookie_store = self
            .cookie_store
            .unwrap_or_else(|| Arc::new(BasicCookieStore::new()));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(BasicCredentialsProvider::new()));
        let schemes = self.scheme_registry.unwrap_or_default();
        let route_resolver = self
            .route_resolver
            .unwrap_or_else(|| Arc::new(DefaultRouteResolver::new()));
        let redirect_strategy = self
            .redirect_strategy
            .unwrap_or_else(|| Arc::new(DefaultRedirectStrategy::new()));

        let mut cookie_agent = CookieAgent::new(cookie_store.clone());
        if let Some(registry) = self.cookie_registry {
            cookie_agent = cookie_agent.with_registry(registry);
        }
        if let Some(policy) = self.cookie_policy {
            cookie_agent = cookie_agent.with_default_policy(policy);
        }

        let target_strategy = Arc::new(DefaultAuthStrategy::target(
            schemes.clone(),
            credentials.clone(),
        ));
        let proxy_strategy = Arc::new(DefaultAuthStrategy::proxy(schemes, credentials.clone()));

        let protocol = ProtocolExec::new(
            transport.clone(),
            cookie_agent,
            target_strategy,
            proxy_strategy.clone(),
        );
        let driver = RedirectDriver::new(
            Arc::new(protocol),
            redirect_strategy,
            route_resolver.clone(),
        );

        Ok(ExchangeClient {
            driver,
            route_resolver,
            tunnel: ProxyTunnel::new(transport, proxy_strategy),
            cookie_store,
            credentials,
            default_config: self.default_config,
        })
    }
}
