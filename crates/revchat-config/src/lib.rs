//! Revchat configuration system.
//!
//! TOML-based configuration with environment fallbacks, validation and a
//! small on-disk token store. Every section uses serde defaults so a
//! partial (or empty) config file works.
//!
//! ```rust,no_run
//! use revchat_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("model: {}", config.chat.model);
//! ```

pub mod env;
pub mod schema;
pub mod token_store;
pub mod toml_loader;
pub mod validation;

pub use schema::{AccountConfig, ChatConfig, LoggingConfig, NetworkConfig, RevchatConfig};
pub use token_store::{StoredTokens, TokenStore};

use revchat_common::ConfigError;

/// Load config from the platform default path, apply environment
/// fallbacks and validate the result.
pub fn load_config() -> Result<RevchatConfig, ConfigError> {
    let mut config = toml_loader::load_default()?;
    env::apply_process_env(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Same as [`load_config`] but reads a specific file.
pub fn load_config_from(path: &std::path::Path) -> Result<RevchatConfig, ConfigError> {
    let mut config = toml_loader::load_from_path(path)?;
    env::apply_process_env(&mut config);
    validation::validate(&config)?;
    Ok(config)
}
