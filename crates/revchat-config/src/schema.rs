//! Configuration schema types.
//!
//! All structs use `serde(default)`; missing fields take the defaults below.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTH_BASE_URL: &str = "https://explorer.api.openai.com";
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://auth0.openai.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TITLE_PREFIX: &str = "revchat:";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevchatConfig {
    pub account: AccountConfig,
    pub network: NetworkConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// Login material. Either email + password, or a previously issued token.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
    /// Short-lived bearer token; skips login entirely when set.
    pub access_token: String,
    /// Long-lived session cookie; lets login skip the credential handshake.
    pub session_token: String,
}

impl AccountConfig {
    pub fn has_credentials(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty() || !self.session_token.is_empty()
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(s: &str) -> &'static str {
            if s.is_empty() {
                ""
            } else {
                "[REDACTED]"
            }
        }
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &redact(&self.password))
            .field("access_token", &redact(&self.access_token))
            .field("session_token", &redact(&self.session_token))
            .finish()
    }
}

/// Transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `http://host:port` or `socks5://[user:pass@]host:port`. Empty = direct.
    pub proxy: String,
    /// Default per-request deadline.
    pub timeout_secs: u64,
    /// Conversation backend. Empty falls back to `CHATGPT_BASE_URL`, then the
    /// built-in endpoint.
    pub base_url: String,
    /// Host serving the csrf / signin / session endpoints.
    pub auth_base_url: String,
    /// Identity provider serving the login pages.
    pub identity_base_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: String::new(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.into(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.into(),
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Default model; empty uses the client's built-in fallback.
    pub model: String,
    /// Generate a title after the first completed turn of a new conversation.
    pub auto_title: bool,
    /// Marker prepended to generated titles.
    pub title_prefix: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            auto_title: true,
            title_prefix: DEFAULT_TITLE_PREFIX.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RevchatConfig::default();
        assert!(config.account.email.is_empty());
        assert_eq!(config.network.timeout_secs, 60);
        assert_eq!(config.network.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert_eq!(config.network.identity_base_url, DEFAULT_IDENTITY_BASE_URL);
        assert!(config.network.base_url.is_empty());
        assert!(config.chat.auto_title);
        assert_eq!(config.chat.title_prefix, "revchat:");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: RevchatConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.timeout_secs, 60);
        assert!(config.chat.auto_title);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: RevchatConfig = toml::from_str(
            r#"
[network]
proxy = "socks5://127.0.0.1:1080"
"#,
        )
        .unwrap();
        assert_eq!(config.network.proxy, "socks5://127.0.0.1:1080");
        assert_eq!(config.network.timeout_secs, 60);
        assert_eq!(config.network.auth_base_url, DEFAULT_AUTH_BASE_URL);
    }

    #[test]
    fn account_debug_redacts_secrets() {
        let account = AccountConfig {
            email: "me@example.com".into(),
            password: "hunter2".into(),
            access_token: "eyJabc".into(),
            session_token: String::new(),
        };
        let dbg = format!("{account:?}");
        assert!(dbg.contains("me@example.com"));
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("eyJabc"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn account_credential_checks() {
        let mut account = AccountConfig::default();
        assert!(!account.has_credentials());
        assert!(!account.has_token());

        account.email = "me@example.com".into();
        assert!(!account.has_credentials());
        account.password = "pw".into();
        assert!(account.has_credentials());

        account.session_token = "sess".into();
        assert!(account.has_token());
    }
}
