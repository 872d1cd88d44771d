//! The redirect loop of one exchange.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::RedirectStrategy;
use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::exec::RequestExecutor;
use crate::http::{HttpHost, HttpRequest, HttpResponse, Route, RouteResolver};

/// Re-issues requests while responses redirect, up to the configured bound.
///
/// Each round goes through the delegate executor, which handles cookies and
/// authentication. On a host change the target negotiation is reset, and
/// so is a connection-bound proxy negotiation.
#[derive(Clone)]
pub struct RedirectDriver {
    delegate: Arc<dyn RequestExecutor>,
    redirect_strategy: Arc<dyn RedirectStrategy>,
    route_resolver: Arc<dyn RouteResolver>,
}

impl std::fmt::Debug for RedirectDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectDriver").finish_non_exhaustive()
    }
}

impl RedirectDriver {
    #[must_use]
    pub fn new(
        delegate: Arc<dyn RequestExecutor>,
        redirect_strategy: Arc<dyn RedirectStrategy>,
        route_resolver: Arc<dyn RouteResolver>,
    ) -> Self {
        Self {
            delegate,
            redirect_strategy,
            route_resolver,
        }
    }

    /// Executes `request` along `route`, following redirects.
    ///
    /// Returns the first response that is not followed. Bodies of followed
    /// responses are consumed before the next round.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::RedirectLimitExceeded`] past
    /// `max_redirects`, [`ExchangeError::InvalidRedirectTarget`] for a
    /// location without a host, and any error of the delegate, redirect
    /// strategy or route resolver.
    #[instrument(level = "debug", skip_all, fields(method = %request.method(), uri = %request.uri()))]
    pub async fn execute(
        &self,
        route: Route,
        request: HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        ctx.redirect_locations.clear();
        let original = request.clone();
        let mut route = route;
        let mut current = request;
        let mut redirect_count = 0_u32;

        loop {
            let mut response = self.delegate.execute(&route, &current, ctx).await?;
            let step = self
                .follow(&original, &current, &mut response, &mut route, &mut redirect_count, ctx)
                .await;
            match step {
                Ok(Some(next)) => current = next,
                Ok(None) => return Ok(response),
                Err(e) => {
                    if e.is_protocol() {
                        if let Err(drain_err) = response.consume_body().await {
                            debug!(error = %drain_err, "failed to drain response body");
                        }
                    }
                    response.close();
                    return Err(e);
                }
            }
        }
    }

    /// Decides one redirect step. `None` means `response` is final.
    async fn follow(
        &self,
        original: &HttpRequest,
        current: &HttpRequest,
        response: &mut HttpResponse,
        route: &mut Route,
        redirect_count: &mut u32,
        ctx: &mut ExchangeContext,
    ) -> Result<Option<HttpRequest>, ExchangeError> {
        if !ctx.config.redirects_enabled()
            || !self.redirect_strategy.is_redirected(current, response, ctx)?
        {
            return Ok(None);
        }

        let max = ctx.config.max_redirects();
        if *redirect_count >= max {
            return Err(ExchangeError::RedirectLimitExceeded { max });
        }
        *redirect_count += 1;

        let mut redirect = self.redirect_strategy.redirect_request(current, response, ctx)?;
        if redirect.headers().is_empty() {
            redirect.set_headers(original.headers().clone());
        }

        let target = HttpHost::from_url(redirect.uri())
            .ok_or_else(|| ExchangeError::invalid_redirect_target(redirect.uri().as_str()))?;

        if !route.target_host().same_endpoint(&target) {
            debug!(from = %route.target_host(), to = %target, "redirect to another host, resetting auth state");
            ctx.target_auth.reset();
            if ctx.proxy_auth.is_connection_based() {
                debug!("resetting connection-based proxy auth state");
                ctx.proxy_auth.reset();
            }
        }

        *route = self.route_resolver.resolve(&target, &redirect, ctx)?;
        debug!(uri = %redirect.uri(), count = *redirect_count, "following redirect");

        response.consume_body().await?;
        response.close();
        Ok(Some(redirect))
    }
}
