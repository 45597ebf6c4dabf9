//! reqwest-backed [`Transport`] with a shared cookie jar.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::types::{Body, HttpRequest, HttpResponse, TransportError};
use super::Transport;

/// Desktop Chrome user agent presented on every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct TransportConfig {
    /// `http://`, `https://`, `socks5://` or `socks5h://`, credentials inline.
    pub proxy: Option<String>,
    /// Deadline for a whole call, including reading the body.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("proxy", &self.proxy.as_deref().map(redact_userinfo))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Hide `user:pass@` in a proxy URL.
pub(crate) fn redact_userinfo(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

pub struct SessionTransport {
    http: reqwest::Client,
    jar: Arc<Jar>,
    default_timeout: Duration,
}

impl SessionTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str());

        if let Some(proxy_url) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| TransportError::Proxy {
                url: redact_userinfo(proxy_url),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
            debug!(proxy = %redact_userinfo(proxy_url), "routing through proxy");
        }

        let http = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            http,
            jar,
            default_timeout: config.timeout,
        })
    }
}

#[async_trait]
impl Transport for SessionTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        debug!(method = %request.method, url = %request.url, "http request");

        let mut builder = self
            .http
            .request(request.method, request.url.as_str())
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let stream = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));
        let body: Body = Box::pin(StreamReader::new(stream));

        debug!(status, url = %request.url, "http response");
        Ok(HttpResponse::new(status, headers, body))
    }

    fn set_cookie(&self, url: &str, name: &str, value: &str) -> Result<(), TransportError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| TransportError::InvalidRequest(format!("{url}: {e}")))?;
        self.jar.add_cookie_str(&format!("{name}={value}"), &url);
        Ok(())
    }
}
