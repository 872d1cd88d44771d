//! Scripted transport for exchange tests that need no sockets.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exchange_core::exec::RequestExecutor;
use exchange_core::http::BufferedBody;
use exchange_core::{ExchangeContext, ExchangeError, HttpRequest, HttpResponse, Route};
use reqwest::StatusCode;
use reqwest::header::{HeaderName, HeaderValue};

/// Returns queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    seen: Mutex<Vec<(Route, HttpRequest)>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::default(),
        })
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(route, _)| route.clone())
            .collect()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedTransport {
    async fn execute(
        &self,
        route: &Route,
        request: &HttpRequest,
        _ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError> {
        self.seen
            .lock()
            .unwrap()
            .push((route.clone(), request.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExchangeError::protocol("script exhausted"))
    }
}

/// Response with one header and a small body.
#[allow(dead_code)]
pub fn response(status: StatusCode, name: HeaderName, value: &'static str) -> HttpResponse {
    HttpResponse::new(status)
        .with_header(name, HeaderValue::from_static(value))
        .with_body(Box::new(BufferedBody::new("body")))
}

/// Plain `200 OK`.
#[allow(dead_code)]
pub fn ok() -> HttpResponse {
    HttpResponse::new(StatusCode::OK).with_body(Box::new(BufferedBody::new("ok")))
}
