//! `CONNECT` tunnelling through an HTTP proxy.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::RequestExecutor;
use crate::auth::{
    AuthNegotiator, AuthProtocolState, AuthSchemeRegistry, AuthScope, AuthStrategy, BasicCredentialsProvider,
    Credentials, CredentialsProvider, DefaultAuthStrategy,
};
use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::http::{HttpHost, HttpRequest, HttpResponse, Route, TunnelType, headers};

/// Opens tunnels, answering `407` challenges with the context's proxy
/// negotiation state.
pub struct ProxyTunnel {
    transport: Arc<dyn RequestExecutor>,
    strategy: Arc<dyn AuthStrategy>,
    negotiator: AuthNegotiator,
}

impl std::fmt::Debug for ProxyTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyTunnel").finish_non_exhaustive()
    }
}

impl ProxyTunnel {
    /// Creates a tunnel helper with a proxy auth strategy.
    #[must_use]
    pub fn new(transport: Arc<dyn RequestExecutor>, strategy: Arc<dyn AuthStrategy>) -> Self {
        Self {
            transport,
            strategy,
            negotiator: AuthNegotiator::new(),
        }
    }

    /// Creates a tunnel helper that authenticates to `proxy` with
    /// `credentials` only.
    #[must_use]
    pub fn with_credentials(
        transport: Arc<dyn RequestExecutor>,
        registry: AuthSchemeRegistry,
        proxy: &HttpHost,
        credentials: Credentials,
    ) -> Self {
        let provider = BasicCredentialsProvider::new();
        provider.set_credentials(
            AuthScope::for_host(proxy.hostname(), Some(proxy.effective_port())),
            credentials,
        );
        Self::new(
            transport,
            Arc::new(DefaultAuthStrategy::proxy(registry, Arc::new(provider))),
        )
    }

    /// Sends `CONNECT` for `target` to `proxy` until the proxy accepts or
    /// stops challenging.
    ///
    /// Returns the `2xx` response that established the tunnel.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for an informational reply,
    /// [`ExchangeError::TunnelRefused`] for a final status above 299, and
    /// transport errors unchanged.
    #[instrument(level = "debug", skip_all, fields(proxy = %proxy, target = %target))]
    pub async fn tunnel(
        &self,
        proxy: &HttpHost,
        target: &HttpHost,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        let target = target.normalized();
        let proxy = proxy.normalized();
        let route = Route::new(target.clone(), Some(proxy.clone()), false, TunnelType::Tunnelled);
        let mut connect = HttpRequest::connect(&target)
            .map_err(|e| ExchangeError::protocol(format!("invalid tunnel target {target}: {e}")))?;
        ctx.target_host = Some(target.clone());
        ctx.route = Some(route.clone());

        let mut round = 0_u32;
        let mut response = loop {
            round += 1;
            self.negotiator
                .apply_auth_response(&mut connect, &mut ctx.proxy_auth)?;
            let mut response = self.transport.execute(&route, &connect, ctx).await?;

            let status = response.status();
            if status.is_informational() {
                return Err(ExchangeError::protocol(format!(
                    "unexpected response to CONNECT request: {status}"
                )));
            }
            let retry = self.negotiator.is_authentication_requested(
                &proxy,
                &response,
                self.strategy.as_ref(),
                &mut ctx.proxy_auth,
            ) && self.negotiator.handle_auth_challenge(
                &proxy,
                &response,
                self.strategy.as_ref(),
                &mut ctx.proxy_auth,
                &ctx.config,
            );
            if !retry {
                break response;
            }
            if round >= ctx.config.max_auth_rounds() {
                warn!(round, "proxy authentication rounds exhausted");
                ctx.proxy_auth.set_state(AuthProtocolState::Failure);
                break response;
            }
            debug!(proxy_auth = %ctx.proxy_auth, "proxy challenged CONNECT, retrying");
            response.consume_body().await?;
            connect.headers_mut().remove(headers::PROXY_AUTHORIZATION);
        };

        let status = response.status();
        if status.as_u16() > 299 {
            response.close();
            return Err(ExchangeError::TunnelRefused {
                status: status.as_u16(),
            });
        }
        info!(status = %status, "tunnel established");
        Ok(response)
    }
}
