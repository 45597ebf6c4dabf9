//! Turning file config and stored tokens into a client config.

use std::time::Duration;

use revchat_client::{AuthTokens, ClientConfig};
use revchat_config::{RevchatConfig, StoredTokens};

/// Explicit config values win over tokens saved by an earlier run.
pub fn client_config(config: &RevchatConfig, stored: Option<&StoredTokens>) -> ClientConfig {
    let account = &config.account;
    let pick = |explicit: &str, saved: Option<&str>| -> String {
        if explicit.is_empty() {
            saved.unwrap_or_default().to_string()
        } else {
            explicit.to_string()
        }
    };

    ClientConfig::default()
        .with_credentials(account.email.as_str(), account.password.as_str())
        .with_access_token(pick(
            &account.access_token,
            stored.map(|t| t.access_token.as_str()),
        ))
        .with_session_token(pick(
            &account.session_token,
            stored.map(|t| t.session_token.as_str()),
        ))
        .with_proxy(config.network.proxy.as_str())
        .with_base_url(config.network.base_url.as_str())
        .with_auth_endpoints(
            config.network.auth_base_url.as_str(),
            config.network.identity_base_url.as_str(),
        )
        .with_timeout(Duration::from_secs(config.network.timeout_secs))
        .with_model(config.chat.model.as_str())
        .with_auto_title(config.chat.auto_title)
        .with_title_prefix(config.chat.title_prefix.as_str())
}

/// Tokens worth saving, if they differ from what is already stored.
pub fn tokens_to_save(current: Option<AuthTokens>, stored: Option<&StoredTokens>) -> Option<StoredTokens> {
    let current = current?;
    let fresh = StoredTokens {
        access_token: current.access_token,
        session_token: current.session_token,
    };
    if fresh.is_empty() || stored == Some(&fresh) {
        return None;
    }
    Some(fresh)
}

/// `revchat=<level>` unless the value is already a full directive.
pub fn log_directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("revchat={level}")
    }
}
