//! Web login: turns an email/password (or a saved session token) into an
//! access token for the backend API.
//!
//! The handshake is a fixed chain of requests where each step consumes the
//! value produced by the previous one. A saved session token skips straight
//! to the last step.

mod steps;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::transport::{Transport, DEFAULT_TIMEOUT};
use crate::ChatError;

pub const DEFAULT_AUTH_BASE_URL: &str = "https://explorer.api.openai.com";
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://auth0.openai.com";

/// Cookie holding the long-lived web session.
pub const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

/// Handshake stage, used to say where a login broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    Csrf,
    Signin,
    Authorize,
    IdentifierPage,
    Identifier,
    Password,
    Resume,
    Callback,
    Session,
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStep::Csrf => "csrf",
            AuthStep::Signin => "signin",
            AuthStep::Authorize => "authorize",
            AuthStep::IdentifierPage => "identifier page",
            AuthStep::Identifier => "identifier",
            AuthStep::Password => "password",
            AuthStep::Resume => "resume",
            AuthStep::Callback => "callback",
            AuthStep::Session => "session",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{step}: {detail}")]
pub struct AuthError {
    pub step: AuthStep,
    pub detail: String,
}

impl AuthError {
    pub fn new(step: AuthStep, detail: impl Into<String>) -> Self {
        Self {
            step,
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.session_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn has_password(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

/// Result of a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    /// Session cookie value; empty when only an access token was supplied.
    pub session_token: String,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

/// Hosts the handshake talks to. Both without a trailing slash.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub auth_base: String,
    pub identity_base: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_BASE_URL.to_string(),
            identity_base: DEFAULT_IDENTITY_BASE_URL.to_string(),
        }
    }
}

impl AuthEndpoints {
    pub fn new(auth_base: impl Into<String>, identity_base: impl Into<String>) -> Self {
        Self {
            auth_base: auth_base.into().trim_end_matches('/').to_string(),
            identity_base: identity_base.into().trim_end_matches('/').to_string(),
        }
    }
}

pub struct Authenticator {
    transport: Arc<dyn Transport>,
    endpoints: AuthEndpoints,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(transport: Arc<dyn Transport>, endpoints: AuthEndpoints) -> Self {
        Self {
            transport,
            endpoints,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log in with whatever the credentials allow.
    ///
    /// A session token is tried first. If the server rejects it and a
    /// password is available, the full handshake runs instead.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthTokens, ChatError> {
        if let Some(session_token) = credentials.session_token.as_deref() {
            match self.exchange_session(session_token).await {
                Ok(tokens) => {
                    info!("logged in with saved session token");
                    return Ok(tokens);
                }
                Err(e) if credentials.has_password() => {
                    warn!(error = %e, "session token rejected, falling back to password login");
                }
                Err(e) => return Err(e),
            }
        }

        if !credentials.has_password() {
            return Err(ChatError::MissingCredentials);
        }

        let tokens = self
            .full_handshake(&credentials.email, &credentials.password)
            .await?;
        info!(email = %credentials.email, "logged in");
        Ok(tokens)
    }

    /// The complete email/password handshake.
    pub async fn full_handshake(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthTokens, ChatError> {
        let csrf = self.fetch_csrf().await?;
        let authorize = self.signin(&csrf).await?;
        let state = self.authorize(&authorize).await?;
        self.identifier_page(&state).await?;
        self.submit_identifier(&state, email).await?;
        let resume = self.submit_password(&state, email, password).await?;
        let callback = self.resume(&state, &resume).await?;
        let session = self.callback(&callback).await?;
        self.exchange_session(session.as_str()).await
    }

    /// Trade a session token for an access token.
    pub async fn exchange_session(&self, session_token: &str) -> Result<AuthTokens, ChatError> {
        self.fetch_access_token(session_token).await
    }
}
