//! Configuration validation. Collects every problem before failing.

use crate::schema::RevchatConfig;
use revchat_common::ConfigError;

const PROXY_SCHEMES: &[&str] = &["http://", "https://", "socks5://", "socks5h://"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RevchatConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(
        &mut errors,
        "network.timeout_secs",
        config.network.timeout_secs,
        1,
        3600,
    );

    let proxy = &config.network.proxy;
    if !proxy.is_empty() && !PROXY_SCHEMES.iter().any(|s| proxy.starts_with(s)) {
        errors.push(format!(
            "network.proxy = {proxy:?} must start with one of {}",
            PROXY_SCHEMES.join(", ")
        ));
    }

    validate_url(&mut errors, "network.base_url", &config.network.base_url, true);
    validate_url(
        &mut errors,
        "network.auth_base_url",
        &config.network.auth_base_url,
        false,
    );
    validate_url(
        &mut errors,
        "network.identity_base_url",
        &config.network.identity_base_url,
        false,
    );

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(format!(
            "logging.level = {:?} must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

fn validate_url(errors: &mut Vec<String>, name: &str, value: &str, allow_empty: bool) {
    if value.is_empty() && allow_empty {
        return;
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        errors.push(format!("{name} = {value:?} is not an http(s) URL"));
    }
}
