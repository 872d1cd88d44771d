//! Request execution: the per-round protocol layer, proxy tunnelling and the
//! `reqwest` transport underneath them.

mod protocol;
mod reqwest_transport;
mod tunnel;

use async_trait::async_trait;

pub use protocol::ProtocolExec;
pub use reqwest_transport::{ReqwestTransport, TransportConfig};
pub use tunnel::ProxyTunnel;

use crate::context::ExchangeContext;
use crate::error::ExchangeError;
use crate::http::{HttpRequest, HttpResponse, Route};

/// Executes one request along a route.
///
/// Implementations may suspend on I/O. Errors they raise propagate
/// unchanged through the layers above.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Sends `request` and returns the response head with its body unread.
    ///
    /// # Errors
    ///
    /// Returns transport errors, and protocol errors from layers that
    /// interpret the response.
    async fn execute(
        &self,
        route: &Route,
        request: &HttpRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<HttpResponse, ExchangeError>;
}
