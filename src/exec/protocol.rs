//! One logical round: cookies and authentication around the transport.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::RequestExecutor;
use crate::auth::{AuthNegotiator, AuthProtocolState, AuthStrategy, ChallengeTarget};
use crate::context::ExchangeContext;
use crate::cookie::CookieAgent;
use crate::error::ExchangeError;
use crate::http::{HttpHost, HttpRequest, HttpResponse, Route};

/// Delegate executor of the redirect driver.
///
/// Every physical attempt starts from a copy of the caller's request, gets
/// cookies and credential headers attached, and has its response cookies
/// stored. The request is re-issued while the target or proxy negotiation
/// asks for another round.
pub struct ProtocolExec {
    transport: Arc<dyn RequestExecutor>,
    cookie_agent: CookieAgent,
    target_strategy: Arc<dyn AuthStrategy>,
    proxy_strategy: Arc<dyn AuthStrategy>,
    negotiator: AuthNegotiator,
}

impl std::fmt::Debug for ProtocolExec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolExec")
            .field("cookie_agent", &self.cookie_agent)
            .finish_non_exhaustive()
    }
}

impl ProtocolExec {
    #[must_use]
    pub fn new(
        transport: Arc<dyn RequestExecutor>,
        cookie_agent: CookieAgent,
        target_strategy: Arc<dyn AuthStrategy>,
        proxy_strategy: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            transport,
            cookie_agent,
            target_strategy,
            proxy_strategy,
            negotiator: AuthNegotiator::new(),
        }
    }

    #[must_use]
    pub fn cookie_agent(&self) -> &CookieAgent {
        &self.cookie_agent
    }

    fn prepare(
        &self,
        route: &Route,
        request: &HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpRequest, ExchangeError> {
        let mut attempt = request.clone();
        self.cookie_agent.attach(&mut attempt, ctx)?;
        if ctx.config.authentication_enabled() {
            // Inside a tunnel the proxy never sees request headers.
            if route.proxy_host().is_some() && !route.is_tunnelled() {
                self.negotiator
                    .apply_auth_response(&mut attempt, &mut ctx.proxy_auth)?;
            }
            self.negotiator
                .apply_auth_response(&mut attempt, &mut ctx.target_auth)?;
        }
        Ok(attempt)
    }

    /// Returns which side to answer when the response is a challenge worth
    /// answering.
    fn needs_authentication(
        &self,
        target: &HttpHost,
        route: &Route,
        response: &HttpResponse,
        ctx: &mut ExchangeContext,
    ) -> Option<ChallengeTarget> {
        if !ctx.config.authentication_enabled() {
            return None;
        }
        let proxy = route.proxy_host().unwrap_or_else(|| route.target_host());

        let target_requested = self.negotiator.is_authentication_requested(
            target,
            response,
            self.target_strategy.as_ref(),
            &mut ctx.target_auth,
        );
        let proxy_requested = self.negotiator.is_authentication_requested(
            proxy,
            response,
            self.proxy_strategy.as_ref(),
            &mut ctx.proxy_auth,
        );

        if target_requested {
            return self
                .negotiator
                .handle_auth_challenge(
                    target,
                    response,
                    self.target_strategy.as_ref(),
                    &mut ctx.target_auth,
                    &ctx.config,
                )
                .then_some(ChallengeTarget::Target);
        }
        if proxy_requested {
            return self
                .negotiator
                .handle_auth_challenge(
                    proxy,
                    response,
                    self.proxy_strategy.as_ref(),
                    &mut ctx.proxy_auth,
                    &ctx.config,
                )
                .then_some(ChallengeTarget::Proxy);
        }
        None
    }
}

#[async_trait]
impl RequestExecutor for ProtocolExec {
    #[instrument(level = "debug", skip_all, fields(method = %request.method(), uri = %request.uri()))]
    async fn execute(
        &self,
        route: &Route,
        request: &HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        let target = HttpHost::from_url(request.uri())
            .ok_or_else(|| ExchangeError::protocol(format!("no target host in {}", request.uri())))?;
        ctx.target_host = Some(target.clone());
        ctx.route = Some(route.clone());
        let target = target.normalized();

        let mut round = 0_u32;
        loop {
            round += 1;
            let attempt = self.prepare(route, request, ctx)?;
            let mut response = self.transport.execute(route, &attempt, ctx).await?;
            let stored = self.cookie_agent.ingest_with_context(&response, ctx);
            debug!(round, status = %response.status(), cookies_stored = stored, "attempt complete");

            let Some(side) = self.needs_authentication(&target, route, &response, ctx) else {
                return Ok(response);
            };
            if round >= ctx.config.max_auth_rounds() {
                warn!(round, auth_target = %side, "authentication rounds exhausted");
                let state = match side {
                    ChallengeTarget::Target => &mut ctx.target_auth,
                    ChallengeTarget::Proxy => &mut ctx.proxy_auth,
                };
                state.set_state(AuthProtocolState::Failure);
                return Ok(response);
            }
            debug!(
                target_auth = %ctx.target_auth,
                proxy_auth = %ctx.proxy_auth,
                "retrying with credentials"
            );
            response.consume_body().await?;
            response.close();
        }
    }
}
