//! Tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Missing config file yields defaults
//! - Malformed config file is an error
//! - Book-file and config-file resolution priority
//! - Atomic config write
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate LARDER_BOOK or LARDER_CONFIG are marked with #[serial].

use larder_common::config::{
    default_book_path, resolve_book_path, resolve_config_path, write_toml_config, TomlConfig,
    BOOK_ENV_VAR, CONFIG_ENV_VAR,
};
use larder_common::{Error, GroupId};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_config_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "planning = [not toml").unwrap();
    assert!(matches!(TomlConfig::load_or_default(&path), Err(Error::Toml(_))));

    std::fs::write(&path, "[logging]\nlevel = \"chatty\"\n").unwrap();
    assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
}

#[test]
fn test_full_config_parses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
book_file = "/srv/larder/book.json"

[planning]
window_days = 21

[logging]
level = "debug"
file = "/var/log/larder.log"

[events]
capacity = 64
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.book_file, Some(PathBuf::from("/srv/larder/book.json")));
    assert_eq!(config.planning.window_days, 21);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/larder.log")));
    assert_eq!(config.events.capacity, 64);
}

#[test]
fn test_default_book_path_is_named_recipes_json() {
    let path = default_book_path();
    assert!(path.ends_with("recipes.json"));
}

#[test]
#[serial]
fn test_book_path_priority() {
    env::remove_var(BOOK_ENV_VAR);
    let config = TomlConfig {
        book_file: Some(PathBuf::from("/toml/book.json")),
        ..Default::default()
    };

    // TOML beats the OS default
    assert_eq!(resolve_book_path(None, &config), PathBuf::from("/toml/book.json"));
    assert_eq!(resolve_book_path(None, &TomlConfig::default()), default_book_path());

    // Environment beats TOML
    env::set_var(BOOK_ENV_VAR, "/env/book.json");
    assert_eq!(resolve_book_path(None, &config), PathBuf::from("/env/book.json"));

    // Command line beats everything
    assert_eq!(
        resolve_book_path(Some(Path::new("/cli/book.json")), &config),
        PathBuf::from("/cli/book.json")
    );
    env::remove_var(BOOK_ENV_VAR);
}

#[test]
#[serial]
fn test_config_path_priority() {
    env::set_var(CONFIG_ENV_VAR, "/env/config.toml");
    assert_eq!(resolve_config_path(None), PathBuf::from("/env/config.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("/cli/config.toml"))),
        PathBuf::from("/cli/config.toml")
    );
    env::remove_var(CONFIG_ENV_VAR);
    assert!(resolve_config_path(None).ends_with("config.toml"));
}

#[test]
fn test_atomic_write_round_trips() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.book_file = Some(PathBuf::from("/data/recipes.json"));
    config.planning.window_days = 7;
    write_toml_config(&config, &target).unwrap();

    assert!(target.exists());
    assert!(!dir.path().join("nested").join("config.toml.tmp").exists());
    assert_eq!(TomlConfig::load(&target).unwrap(), config);
}

#[test]
fn test_atomic_write_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("config.toml");
    std::fs::write(&target, "stale = true\n").unwrap();

    write_toml_config(&TomlConfig::default(), &target).unwrap();
    let content = std::fs::read_to_string(&target).unwrap();
    assert!(!content.contains("stale"));
    assert!(content.contains("window_days = 14"));
}

#[test]
fn test_taxonomy_file_overrides_builtin() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("taxonomy.json");
    std::fs::write(
        &path,
        r##"{
            "groups": [[1, "Grains", ""], [2, "Greens", "#0f0"]],
            "regimens": [[1, "Any", ""]],
            "dish_types": [[1, "Dish", ""]],
            "durations": [[1, "Short", ""]],
            "statuses": [[1, "New", ""]]
        }"##,
    )
    .unwrap();

    let config = TomlConfig {
        taxonomy_file: Some(path),
        ..Default::default()
    };
    let taxonomy = config.load_taxonomy().unwrap();
    assert_eq!(taxonomy.groups.len(), 2);
    assert_eq!(taxonomy.groups.at(GroupId(2)).unwrap().text, "Greens");

    let missing = TomlConfig {
        taxonomy_file: Some(dir.path().join("absent.json")),
        ..Default::default()
    };
    assert!(matches!(missing.load_taxonomy(), Err(Error::Config(_))));
}
