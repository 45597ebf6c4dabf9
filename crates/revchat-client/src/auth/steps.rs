//! The individual requests of the login handshake.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{AuthError, AuthStep, AuthTokens, Authenticator, SESSION_COOKIE};
use crate::transport::{HttpRequest, HttpResponse};
use crate::{truncate_body, ChatError};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

static STATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"state=([^"&\s]+)"#).unwrap());

pub(crate) struct CsrfToken(String);
pub(crate) struct AuthorizeUrl(String);
pub(crate) struct LoginState(String);
pub(crate) struct ResumeState(String);
pub(crate) struct CallbackUrl {
    location: String,
    referer: String,
}
pub(crate) struct SessionToken(String);

impl SessionToken {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// First `state=` value in a page or redirect target.
pub(crate) fn extract_state(text: &str) -> Option<String> {
    STATE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn fail(step: AuthStep, status: u16, body: &str) -> ChatError {
    ChatError::Auth(AuthError::new(
        step,
        format!("HTTP {status}: {}", truncate_body(body)),
    ))
}

fn json_field(body: &str, field: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get(field)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Look for the state in the body first, then in the redirect target.
fn state_from(response_location: Option<&str>, body: &str) -> Option<String> {
    extract_state(body).or_else(|| response_location.and_then(extract_state))
}

struct Received {
    status: u16,
    location: Option<String>,
    json: bool,
    session_cookie: Option<String>,
    body: String,
}

impl Authenticator {
    async fn send(&self, step: AuthStep, request: HttpRequest) -> Result<Received, ChatError> {
        debug!(step = %step, url = %request.url, "auth step");
        let response: HttpResponse = self
            .transport
            .execute(request.timeout(self.timeout))
            .await?;
        let status = response.status;
        let location = response.header("location").map(str::to_string);
        let json = response.is_json();
        let session_cookie = response.cookie(SESSION_COOKIE);
        let body = response.text().await?;
        debug!(step = %step, status, "auth step response");
        Ok(Received {
            status,
            location,
            json,
            session_cookie,
            body,
        })
    }

    fn login_page(&self) -> String {
        format!("{}/auth/login", self.endpoints.auth_base)
    }

    fn identity_url(&self, path: &str, state: &str) -> String {
        format!("{}{path}?state={state}", self.endpoints.identity_base)
    }

    pub(crate) async fn fetch_csrf(&self) -> Result<CsrfToken, ChatError> {
        let url = format!("{}/api/auth/csrf", self.endpoints.auth_base);
        let request = HttpRequest::get(url).headers([
            ("Accept", "*/*"),
            ("Accept-Language", "en-GB,en-US;q=0.9,en;q=0.8"),
            ("Referer", self.login_page().as_str()),
        ]);
        let resp = self.send(AuthStep::Csrf, request).await?;
        if resp.status != 200 || !resp.json {
            return Err(fail(AuthStep::Csrf, resp.status, &resp.body));
        }
        let token = json_field(&resp.body, "csrfToken")
            .ok_or_else(|| fail(AuthStep::Csrf, resp.status, &resp.body))?;
        debug!("csrf token acquired");
        Ok(CsrfToken(token))
    }

    pub(crate) async fn signin(&self, csrf: &CsrfToken) -> Result<AuthorizeUrl, ChatError> {
        let url = format!(
            "{}/api/auth/signin/auth0?prompt=login",
            self.endpoints.auth_base
        );
        let request = HttpRequest::post(url)
            .headers([
                ("Accept", "*/*"),
                ("Accept-Language", "en-US,en;q=0.8"),
                ("Origin", self.endpoints.auth_base.as_str()),
                ("Referer", self.login_page().as_str()),
                ("Sec-Fetch-Site", "same-origin"),
                ("Sec-Fetch-Mode", "cors"),
                ("Sec-Fetch-Dest", "empty"),
            ])
            .form(&[
                ("callbackUrl", "/"),
                ("csrfToken", csrf.0.as_str()),
                ("json", "true"),
            ]);
        let resp = self.send(AuthStep::Signin, request).await?;
        if resp.status != 200 || !resp.json {
            return Err(fail(AuthStep::Signin, resp.status, &resp.body));
        }
        let url = json_field(&resp.body, "url")
            .ok_or_else(|| fail(AuthStep::Signin, resp.status, &resp.body))?;
        if url.contains("error") {
            return Err(ChatError::RateLimited);
        }
        Ok(AuthorizeUrl(url))
    }

    pub(crate) async fn authorize(&self, url: &AuthorizeUrl) -> Result<LoginState, ChatError> {
        let referer = format!("{}/", self.endpoints.auth_base);
        let request = HttpRequest::get(url.0.as_str()).headers([
            ("Accept", HTML_ACCEPT),
            ("Accept-Language", ACCEPT_LANGUAGE),
            ("Referer", referer.as_str()),
        ]);
        let resp = self.send(AuthStep::Authorize, request).await?;
        if resp.status != 200 && resp.status != 302 {
            return Err(fail(AuthStep::Authorize, resp.status, &resp.body));
        }
        let state = state_from(resp.location.as_deref(), &resp.body)
            .ok_or_else(|| fail(AuthStep::Authorize, resp.status, &resp.body))?;
        Ok(LoginState(state))
    }

    pub(crate) async fn identifier_page(&self, state: &LoginState) -> Result<(), ChatError> {
        let referer = format!("{}/", self.endpoints.auth_base);
        let request = HttpRequest::get(self.identity_url("/u/login/identifier", &state.0))
            .headers([
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", ACCEPT_LANGUAGE),
                ("Referer", referer.as_str()),
            ]);
        let resp = self.send(AuthStep::IdentifierPage, request).await?;
        if resp.status != 200 {
            return Err(fail(AuthStep::IdentifierPage, resp.status, &resp.body));
        }
        Ok(())
    }

    pub(crate) async fn submit_identifier(
        &self,
        state: &LoginState,
        email: &str,
    ) -> Result<(), ChatError> {
        let url = self.identity_url("/u/login/identifier", &state.0);
        let request = HttpRequest::post(url.as_str())
            .headers([
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", ACCEPT_LANGUAGE),
                ("Origin", self.endpoints.identity_base.as_str()),
                ("Referer", url.as_str()),
            ])
            .form(&[
                ("state", state.0.as_str()),
                ("username", email),
                ("js-available", "false"),
                ("webauthn-available", "true"),
                ("is-brave", "false"),
                ("webauthn-platform-available", "true"),
                ("action", "default"),
            ]);
        let resp = self.send(AuthStep::Identifier, request).await?;
        if resp.status != 200 && resp.status != 302 {
            return Err(fail(AuthStep::Identifier, resp.status, &resp.body));
        }
        Ok(())
    }

    pub(crate) async fn submit_password(
        &self,
        state: &LoginState,
        email: &str,
        password: &str,
    ) -> Result<ResumeState, ChatError> {
        let url = self.identity_url("/u/login/password", &state.0);
        let request = HttpRequest::post(url.as_str())
            .headers([
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", ACCEPT_LANGUAGE),
                ("Origin", self.endpoints.identity_base.as_str()),
                ("Referer", url.as_str()),
            ])
            .form(&[
                ("state", state.0.as_str()),
                ("username", email),
                ("password", password),
                ("action", "default"),
            ]);
        let resp = self.send(AuthStep::Password, request).await?;
        if resp.status != 200 && resp.status != 302 {
            return Err(ChatError::InvalidCredentials(format!(
                "HTTP {}: {}",
                resp.status,
                truncate_body(&resp.body)
            )));
        }
        let resume = state_from(resp.location.as_deref(), &resp.body)
            .ok_or_else(|| fail(AuthStep::Password, resp.status, &resp.body))?;
        Ok(ResumeState(resume))
    }

    pub(crate) async fn resume(
        &self,
        state: &LoginState,
        resume: &ResumeState,
    ) -> Result<CallbackUrl, ChatError> {
        let url = self.identity_url("/authorize/resume", &resume.0);
        let referer = self.identity_url("/u/login/password", &state.0);
        let request = HttpRequest::get(url.as_str()).headers([
            ("Accept", HTML_ACCEPT),
            ("Accept-Language", "en-GB,en-US;q=0.9,en;q=0.8"),
            ("Referer", referer.as_str()),
        ]);
        let resp = self.send(AuthStep::Resume, request).await?;
        if resp.status != 302 {
            return Err(fail(AuthStep::Resume, resp.status, &resp.body));
        }
        let location = resp
            .location
            .filter(|l| !l.is_empty())
            .ok_or_else(|| fail(AuthStep::Resume, resp.status, "redirect without location"))?;
        Ok(CallbackUrl {
            location,
            referer: url,
        })
    }

    pub(crate) async fn callback(&self, callback: &CallbackUrl) -> Result<SessionToken, ChatError> {
        let request = HttpRequest::get(callback.location.as_str()).headers([
            ("Accept", "application/json"),
            ("Accept-Language", "en-GB,en-US;q=0.9,en;q=0.8"),
            ("Referer", callback.referer.as_str()),
        ]);
        let resp = self.send(AuthStep::Callback, request).await?;
        if resp.status != 302 {
            return Err(fail(AuthStep::Callback, resp.status, &resp.body));
        }
        let token = resp
            .session_cookie
            .filter(|t| !t.is_empty())
            .ok_or_else(|| fail(AuthStep::Callback, resp.status, "no session cookie"))?;
        debug!("session cookie acquired");
        Ok(SessionToken(token))
    }

    pub(crate) async fn fetch_access_token(
        &self,
        session_token: &str,
    ) -> Result<AuthTokens, ChatError> {
        let url = format!("{}/api/auth/session", self.endpoints.auth_base);
        self.transport.set_cookie(&url, SESSION_COOKIE, session_token)?;
        let resp = self.send(AuthStep::Session, HttpRequest::get(url)).await?;
        if resp.status != 200 {
            return Err(fail(AuthStep::Session, resp.status, &resp.body));
        }
        let access_token = json_field(&resp.body, "accessToken")
            .ok_or_else(|| fail(AuthStep::Session, resp.status, &resp.body))?;
        Ok(AuthTokens {
            access_token,
            session_token: session_token.to_string(),
        })
    }
}
