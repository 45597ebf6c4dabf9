//! Session transport.
//!
//! The only layer that touches the network. It knows nothing about the
//! conversation protocol: callers hand it a request and interpret the status
//! code themselves. Redirects are never followed so that callers can read
//! `Location` headers.

mod http;
mod types;

use async_trait::async_trait;

pub use http::{SessionTransport, TransportConfig, BROWSER_USER_AGENT, DEFAULT_TIMEOUT};
pub(crate) use http::redact_userinfo;
pub use types::{Body, HttpRequest, HttpResponse, Method, TransportError};

/// Request executor shared by the authenticator and the conversation client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Non-2xx statuses are returned, not raised.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Put a cookie in the shared store so later requests to `url` carry it.
    fn set_cookie(&self, url: &str, name: &str, value: &str) -> Result<(), TransportError>;
}
