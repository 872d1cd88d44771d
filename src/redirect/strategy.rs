//! Which responses are redirects and what request follows them.

use reqwest::{Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::http::{HttpRequest, HttpResponse, headers};

/// Decides whether to follow a response and builds the follow-up request.
pub trait RedirectStrategy: Send + Sync {
    /// Returns true when `response` should be followed.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the response is a malformed redirect.
    fn is_redirected(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        ctx: &ExchangeContext,
    ) -> Result<bool, ExchangeError>;

    /// Builds the request to issue next. Records the location in
    /// `ctx.redirect_locations`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for a missing or invalid `Location`, and
    /// [`ExchangeError::CircularRedirect`] for a location already visited.
    fn redirect_request(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpRequest, ExchangeError>;
}

/// Follows redirects for safe methods only; lax mode also follows POST and
/// DELETE.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRedirectStrategy {
    lax: bool,
}

impl DefaultRedirectStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy that also redirects POST and DELETE.
    #[must_use]
    pub fn lax() -> Self {
        Self { lax: true }
    }

    fn is_redirectable(&self, method: &Method) -> bool {
        *method == Method::GET
            || *method == Method::HEAD
            || (self.lax && (*method == Method::POST || *method == Method::DELETE))
    }

    fn location_uri(
        request: &HttpRequest,
        response: &HttpResponse,
        ctx: &ExchangeContext,
    ) -> Result<Url, ExchangeError> {
        let location = response.header_str(&headers::LOCATION).ok_or_else(|| {
            ExchangeError::protocol(format!(
                "received redirect response {} but no location header",
                response.status()
            ))
        })?;
        debug!(location, "redirect requested");

        let mut uri = match Url::parse(location) {
            Ok(uri) => uri,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                if !ctx.config.relative_redirects_allowed() {
                    return Err(ExchangeError::protocol(format!(
                        "relative redirect location '{location}' not allowed"
                    )));
                }
                request.uri().join(location).map_err(|e| {
                    ExchangeError::protocol(format!("invalid redirect URI {location}: {e}"))
                })?
            }
            Err(e) => {
                return Err(ExchangeError::protocol(format!(
                    "invalid redirect URI {location}: {e}"
                )));
            }
        };
        uri.set_fragment(None);
        Ok(uri)
    }
}

impl RedirectStrategy for DefaultRedirectStrategy {
    fn is_redirected(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        _ctx: &ExchangeContext,
    ) -> Result<bool, ExchangeError> {
        let method = request.method();
        Ok(match response.status() {
            StatusCode::FOUND => {
                self.is_redirectable(method) && response.headers().contains_key(headers::LOCATION)
            }
            StatusCode::MOVED_PERMANENTLY
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT => self.is_redirectable(method),
            StatusCode::SEE_OTHER => true,
            _ => false,
        })
    }

    fn redirect_request(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpRequest, ExchangeError> {
        let uri = Self::location_uri(request, response, ctx)?;
        if !ctx.config.circular_redirects_allowed() && ctx.redirect_locations.contains(&uri) {
            return Err(ExchangeError::CircularRedirect {
                uri: uri.to_string(),
            });
        }
        ctx.redirect_locations.push(uri.clone());

        let status = response.status();
        let redirect = if *request.method() == Method::HEAD {
            HttpRequest::new(Method::HEAD, uri)
        } else if status == StatusCode::TEMPORARY_REDIRECT || status == StatusCode::PERMANENT_REDIRECT {
            let next = HttpRequest::new(request.method().clone(), uri);
            match request.body() {
                Some(body) => next.with_body(body.to_vec()),
                None => next,
            }
        } else {
            HttpRequest::get(uri)
        };
        Ok(redirect)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::RequestConfig;
    use reqwest::header::HeaderValue;

    fn request(method: Method, uri: &str) -> HttpRequest {
        HttpRequest::new(method, Url::parse(uri).unwrap())
    }

    fn redirect(status: StatusCode, location: Option<&'static str>) -> HttpResponse {
        let response = HttpResponse::new(status);
        match location {
            Some(location) => {
                response.with_header(headers::LOCATION, HeaderValue::from_static(location))
            }
            None => response,
        }
    }

    #[test]
    fn test_is_redirected_by_status_and_method() {
        let strategy = DefaultRedirectStrategy::new();
        let ctx = ExchangeContext::default();
        let get = request(Method::GET, "http://a.example/");
        let post = request(Method::POST, "http://a.example/");

        let found = redirect(StatusCode::FOUND, Some("/next"));
        assert!(strategy.is_redirected(&get, &found, &ctx).unwrap());
        assert!(!strategy.is_redirected(&post, &found, &ctx).unwrap());
        assert!(!strategy
            .is_redirected(&get, &redirect(StatusCode::FOUND, None), &ctx)
            .unwrap());
        assert!(strategy
            .is_redirected(&post, &redirect(StatusCode::SEE_OTHER, None), &ctx)
            .unwrap());
        assert!(!strategy
            .is_redirected(&get, &redirect(StatusCode::OK, None), &ctx)
            .unwrap());

        let lax = DefaultRedirectStrategy::lax();
        assert!(lax.is_redirected(&post, &found, &ctx).unwrap());
    }

    #[test]
    fn test_relative_location_resolved_and_fragment_stripped() {
        let strategy = DefaultRedirectStrategy::new();
        let mut ctx = ExchangeContext::default();
        let next = strategy
            .redirect_request(
                &request(Method::GET, "http://a.example/dir/page"),
                &redirect(StatusCode::FOUND, Some("other?x=1#top")),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(next.uri().as_str(), "http://a.example/dir/other?x=1");
        assert!(next.headers().is_empty());
        assert_eq!(ctx.redirect_locations.len(), 1);
    }

    #[test]
    fn test_relative_location_rejected_when_disabled() {
        let strategy = DefaultRedirectStrategy::new();
        let mut ctx =
            ExchangeContext::new(RequestConfig::default().with_relative_redirects_allowed(false));
        let err = strategy
            .redirect_request(
                &request(Method::GET, "http://a.example/"),
                &redirect(StatusCode::FOUND, Some("/next")),
                &mut ctx,
            )
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
    }

    #[test]
    fn test_circular_redirect_detected() {
        let strategy = DefaultRedirectStrategy::new();
        let mut ctx = ExchangeContext::default();
        let get = request(Method::GET, "http://a.example/");
        let response = redirect(StatusCode::MOVED_PERMANENTLY, Some("http://b.example/"));
        strategy.redirect_request(&get, &response, &mut ctx).unwrap();
        assert!(matches!(
            strategy.redirect_request(&get, &response, &mut ctx),
            Err(ExchangeError::CircularRedirect { .. })
        ));

        let mut allowed =
            ExchangeContext::new(RequestConfig::default().with_circular_redirects_allowed(true));
        strategy.redirect_request(&get, &response, &mut allowed).unwrap();
        strategy.redirect_request(&get, &response, &mut allowed).unwrap();
    }

    #[test]
    fn test_method_rewriting() {
        let strategy = DefaultRedirectStrategy::lax();
        let post = request(Method::POST, "http://a.example/form").with_body("a=1");

        let mut ctx = ExchangeContext::default();
        let kept = strategy
            .redirect_request(&post, &redirect(StatusCode::TEMPORARY_REDIRECT, Some("/v2")), &mut ctx)
            .unwrap();
        assert_eq!(kept.method(), Method::POST);
        assert_eq!(kept.body(), Some(&b"a=1"[..]));

        let mut ctx = ExchangeContext::default();
        let rewritten = strategy
            .redirect_request(&post, &redirect(StatusCode::SEE_OTHER, Some("/done")), &mut ctx)
            .unwrap();
        assert_eq!(rewritten.method(), Method::GET);
        assert!(rewritten.body().is_none());

        let mut ctx = ExchangeContext::default();
        let head = strategy
            .redirect_request(
                &request(Method::HEAD, "http://a.example/"),
                &redirect(StatusCode::FOUND, Some("/x")),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(head.method(), Method::HEAD);
    }

    #[test]
    fn test_missing_location_is_protocol_error() {
        let strategy = DefaultRedirectStrategy::new();
        let mut ctx = ExchangeContext::default();
        let err = strategy
            .redirect_request(
                &request(Method::GET, "http://a.example/"),
                &redirect(StatusCode::SEE_OTHER, None),
                &mut ctx,
            )
            .unwrap_err();
        assert!(err.is_protocol());
    }
}
