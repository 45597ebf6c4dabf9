//! Read config from a path or from the platform default location.

use crate::schema::RevchatConfig;
use crate::validation;
use revchat_common::ConfigError;
use std::path::Path;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};

/// Load config from a specific TOML file path.
///
/// Missing fields take serde defaults. Validation problems are logged but
/// the parsed config is still returned; callers that need a hard failure
/// run [`validation::validate`] themselves.
pub fn load_from_path(path: &Path) -> Result<RevchatConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: RevchatConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform default path, creating a commented
/// default file first if none exists.
///
/// On Linux: `~/.config/revchat/config.toml`
pub fn load_default() -> Result<RevchatConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(&path)?;
            Ok(RevchatConfig::default())
        }
        Err(e) => Err(e),
    }
}
