//! Conversation client: ties login, the cache and the transport together.

mod ask;
mod conversations;
mod title;


use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::info;

use crate::auth::{
    AuthEndpoints, AuthTokens, Authenticator, Credentials, DEFAULT_AUTH_BASE_URL,
    DEFAULT_IDENTITY_BASE_URL,
};
use crate::background::BackgroundTasks;
use crate::cache::ConversationCache;
use crate::transport::{SessionTransport, Transport, TransportConfig, BROWSER_USER_AGENT, DEFAULT_TIMEOUT};
use crate::ChatError;

pub use ask::AskRequest;
pub use conversations::{ConversationPage, ConversationSummary};

pub const DEFAULT_BASE_URL: &str = "https://chat.openai.com/backend-api/";
pub const DEFAULT_MODEL: &str = "text-davinci-002-render-sha";
pub const BASE_URL_ENV: &str = "CHATGPT_BASE_URL";
pub const DEFAULT_TITLE_PREFIX: &str = "revchat:";
/// Title the server gives a conversation before it is named.
pub const NEW_CHAT_TITLE: &str = "New chat";
/// Page size used when refreshing the listing internally.
pub const LIST_PAGE_LIMIT: u32 = 50;

/// Base URL precedence: explicit value, then the environment, then the
/// default. Always ends with `/`.
pub fn resolve_base_url(explicit: &str, env: Option<String>) -> String {
    let mut url = if !explicit.is_empty() {
        explicit.to_string()
    } else {
        env.filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[derive(Clone)]
pub struct ClientConfig {
    pub email: String,
    pub password: String,
    pub access_token: String,
    pub session_token: String,
    pub proxy: String,
    /// Default model; empty means [`DEFAULT_MODEL`].
    pub model: String,
    /// Backend API root; empty means `CHATGPT_BASE_URL` or the default.
    pub base_url: String,
    pub auth_base_url: String,
    pub identity_base_url: String,
    pub timeout: Duration,
    pub auto_title: bool,
    pub title_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            access_token: String::new(),
            session_token: String::new(),
            proxy: String::new(),
            model: String::new(),
            base_url: String::new(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            auto_title: true,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("email", &self.email)
            .field("password", &redact(&self.password))
            .field("access_token", &redact(&self.access_token))
            .field("session_token", &redact(&self.session_token))
            .field("proxy", &crate::transport::redact_userinfo(&self.proxy))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("auth_base_url", &self.auth_base_url)
            .field("identity_base_url", &self.identity_base_url)
            .field("timeout", &self.timeout)
            .field("auto_title", &self.auto_title)
            .field("title_prefix", &self.title_prefix)
            .finish()
    }
}

impl ClientConfig {
    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = token.into();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_auth_endpoints(
        mut self,
        auth_base_url: impl Into<String>,
        identity_base_url: impl Into<String>,
    ) -> Self {
        self.auth_base_url = auth_base_url.into();
        self.identity_base_url = identity_base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auto_title(mut self, enabled: bool) -> Self {
        self.auto_title = enabled;
        self
    }

    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = prefix.into();
        self
    }

    pub fn resolved_base_url(&self) -> String {
        resolve_base_url(&self.base_url, std::env::var(BASE_URL_ENV).ok())
    }

    /// Per-call override, then the configured model, then [`DEFAULT_MODEL`].
    pub fn resolve_model(&self, requested: &str) -> String {
        [requested, self.model.as_str()]
            .into_iter()
            .find(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.as_str(), self.password.as_str())
            .with_session_token(self.session_token.as_str())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            proxy: (!self.proxy.is_empty()).then(|| self.proxy.clone()),
            timeout: self.timeout,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }

    pub fn auth_endpoints(&self) -> AuthEndpoints {
        AuthEndpoints::new(self.auth_base_url.as_str(), self.identity_base_url.as_str())
    }
}

/// State shared with background jobs.
pub(crate) struct ClientInner {
    config: ClientConfig,
    base_url: String,
    transport: Arc<dyn Transport>,
    cache: ConversationCache,
    tokens: RwLock<Option<AuthTokens>>,
    login_gate: tokio::sync::Mutex<()>,
}

impl ClientInner {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn current_tokens(&self) -> Option<AuthTokens> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn access_token(&self) -> Option<String> {
        self.current_tokens()
            .map(|t| t.access_token)
            .filter(|t| !t.is_empty())
    }

    async fn login(&self) -> Result<AuthTokens, ChatError> {
        let mut credentials = self.config.credentials();
        if let Some(saved) = self.current_tokens().filter(|t| !t.session_token.is_empty()) {
            credentials.session_token = Some(saved.session_token);
        }
        let authenticator = Authenticator::new(Arc::clone(&self.transport), self.config.auth_endpoints())
            .with_timeout(self.config.timeout);
        let tokens = authenticator.login(&credentials).await?;
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        info!("access token refreshed");
        Ok(tokens)
    }

    /// Access token, logging in first if there is none.
    async fn ensure_token(&self) -> Result<String, ChatError> {
        if let Some(token) = self.access_token() {
            return Ok(token);
        }
        let _gate = self.login_gate.lock().await;
        if let Some(token) = self.access_token() {
            return Ok(token);
        }
        Ok(self.login().await?.access_token)
    }

    fn api_headers(&self, token: &str, accept: &str) -> Vec<(String, String)> {
        vec![
            ("Accept".into(), accept.into()),
            ("Authorization".into(), format!("Bearer {token}")),
            ("Content-Type".into(), "application/json".into()),
            ("Accept-Language".into(), "en-US,en;q=0.9".into()),
            ("X-Openai-Assistant-App-Id".into(), String::new()),
            ("Referer".into(), "https://chat.openai.com/chat".into()),
        ]
    }
}

/// Chat client for one account.
///
/// Automatic titling runs as background jobs owned by the client. Dropping
/// the client aborts jobs still in flight, so call
/// [`ChatClient::wait_background`] before dropping it when titles matter.
pub struct ChatClient {
    inner: Arc<ClientInner>,
    background: BackgroundTasks,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.inner.config)
            .field("base_url", &self.inner.base_url)
            .field("cached_conversations", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Client on a fresh [`SessionTransport`].
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let transport = SessionTransport::new(config.transport_config())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let base_url = config.resolved_base_url();
        let tokens = (!config.access_token.is_empty()).then(|| AuthTokens {
            access_token: config.access_token.clone(),
            session_token: config.session_token.clone(),
        });
        Self {
            inner: Arc::new(ClientInner {
                config,
                base_url,
                transport,
                cache: ConversationCache::new(),
                tokens: RwLock::new(tokens),
                login_gate: tokio::sync::Mutex::new(()),
            }),
            background: BackgroundTasks::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.inner.cache
    }

    /// Tokens from the last login (or the configured access token).
    pub fn tokens(&self) -> Option<AuthTokens> {
        self.inner.current_tokens()
    }

    /// Log in now, even if an access token is already held.
    pub async fn login(&self) -> Result<AuthTokens, ChatError> {
        let _gate = self.inner.login_gate.lock().await;
        self.inner.login().await
    }

    /// Log in only if no access token is held.
    pub async fn ensure_logged_in(&self) -> Result<(), ChatError> {
        self.inner.ensure_token().await.map(|_| ())
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Wait for background jobs such as automatic titling.
    pub async fn wait_background(&self) {
        self.background.drain().await;
    }
}
