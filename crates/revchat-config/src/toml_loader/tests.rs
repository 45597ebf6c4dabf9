//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_revchat_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, revchat_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[account]
email = "me@example.com"

[chat]
model = "gpt-4"
auto_title = false
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.account.email, "me@example.com");
    assert_eq!(config.chat.model, "gpt-4");
    assert!(!config.chat.auto_title);
    // Defaults preserved
    assert_eq!(config.chat.title_prefix, "revchat:");
    assert_eq!(config.network.timeout_secs, 60);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, revchat_common::ConfigError::ParseError(_)));
}

#[test]
fn invalid_values_are_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[network]\ntimeout_secs = 0\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.network.timeout_secs, 0);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("revchat").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert!(config.chat.auto_title);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::RevchatConfig;

    let config: RevchatConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("revchat"));
        assert!(path_str.ends_with("config.toml"));
    }
}
