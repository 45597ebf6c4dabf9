//! Environment-variable fallbacks.
//!
//! A variable only fills a field the config file left empty.

use crate::schema::RevchatConfig;

pub const ENV_BASE_URL: &str = "CHATGPT_BASE_URL";
pub const ENV_EMAIL: &str = "REVCHAT_EMAIL";
pub const ENV_PASSWORD: &str = "REVCHAT_PASSWORD";
pub const ENV_ACCESS_TOKEN: &str = "REVCHAT_ACCESS_TOKEN";
pub const ENV_SESSION_TOKEN: &str = "REVCHAT_SESSION_TOKEN";
pub const ENV_PROXY: &str = "REVCHAT_PROXY";

/// Apply fallbacks from the process environment.
pub fn apply_process_env(config: &mut RevchatConfig) {
    apply_env(config, |key| std::env::var(key).ok());
}

/// Apply fallbacks from an arbitrary lookup.
pub fn apply_env(config: &mut RevchatConfig, lookup: impl Fn(&str) -> Option<String>) {
    let fill = |field: &mut String, key: &str| {
        if field.is_empty() {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    };

    fill(&mut config.network.base_url, ENV_BASE_URL);
    fill(&mut config.network.proxy, ENV_PROXY);
    fill(&mut config.account.email, ENV_EMAIL);
    fill(&mut config.account.password, ENV_PASSWORD);
    fill(&mut config.account.access_token, ENV_ACCESS_TOKEN);
    fill(&mut config.account.session_token, ENV_SESSION_TOKEN);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_fills_empty_fields() {
        let mut config = RevchatConfig::default();
        apply_env(
            &mut config,
            lookup(&[
                (ENV_BASE_URL, "https://proxy.example/api/"),
                (ENV_EMAIL, "me@example.com"),
                (ENV_SESSION_TOKEN, "sess"),
            ]),
        );
        assert_eq!(config.network.base_url, "https://proxy.example/api/");
        assert_eq!(config.account.email, "me@example.com");
        assert_eq!(config.account.session_token, "sess");
        assert!(config.account.password.is_empty());
    }

    #[test]
    fn file_values_win_over_env() {
        let mut config = RevchatConfig::default();
        config.network.proxy = "http://127.0.0.1:9080".into();
        apply_env(&mut config, lookup(&[(ENV_PROXY, "socks5://10.0.0.1:1080")]));
        assert_eq!(config.network.proxy, "http://127.0.0.1:9080");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = RevchatConfig::default();
        apply_env(&mut config, lookup(&[(ENV_ACCESS_TOKEN, "")]));
        assert!(config.account.access_token.is_empty());
    }
}
