//! Persisted login tokens.
//!
//! A successful login yields an access token and a session token. Keeping
//! both lets the next process start skip the credential handshake.

use std::path::{Path, PathBuf};

use revchat_common::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::toml_loader::config_dir;

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub session_token: String,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

impl StoredTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.session_token.is_empty()
    }
}

/// JSON token file, written atomically.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `tokens.json` in the platform config directory.
    pub fn default_location() -> Result<Self, ConfigError> {
        Ok(Self::new(config_dir()?.join("tokens.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored tokens. A missing file is not an error.
    pub fn load(&self) -> Result<Option<StoredTokens>, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::ParseError(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let tokens: StoredTokens = serde_json::from_str(&content).map_err(|e| {
            ConfigError::ParseError(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        debug!("loaded tokens from {}", self.path.display());
        Ok(Some(tokens).filter(|t| !t.is_empty()))
    }

    /// Write tokens (tmp file + rename).
    pub fn save(&self, tokens: &StoredTokens) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| ConfigError::ParseError(format!("failed to serialize tokens: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::ParseError(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to write tokens to {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!("atomic rename failed ({e}), falling back to direct write");
            std::fs::write(&self.path, &json).map_err(|e2| {
                ConfigError::ParseError(format!(
                    "failed to write tokens to {}: {e2}",
                    self.path.display()
                ))
            })?;
        }

        debug!("saved tokens to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredTokens {
        StoredTokens {
            access_token: "eyJ.access".into(),
            session_token: "session-cookie".into(),
        }
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("tokens.json"));
        store.save(&sample()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, sample());
        assert!(!dir.path().join("nested").join("tokens.json.tmp").exists());
    }

    #[test]
    fn empty_tokens_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&StoredTokens::default()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = TokenStore::new(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn debug_redacts_tokens() {
        let dbg = format!("{:?}", sample());
        assert!(!dbg.contains("eyJ.access"));
        assert!(!dbg.contains("session-cookie"));
    }
}
