use std::fs;

use taskflow::config::{BackendKind, Config, ConfigError};
use taskflow::Profile;
use tempfile::TempDir;

#[test]
fn missing_config_is_written_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("config.toml");

    let config = Config::load_from_path(&path, Profile::Dev)?;
    assert_eq!(config.storage.backend, BackendKind::Sqlite);
    assert_eq!(config.display.date_format, "%Y-%m-%d");
    assert!(path.exists());

    let written = fs::read_to_string(&path)?;
    assert!(written.contains("backend = \"sqlite\""));
    Ok(())
}

#[test]
fn backend_is_selected_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[storage]\nbackend = \"memory\"\n")?;

    let config = Config::load_from_path(&path, Profile::Prod)?;
    assert_eq!(config.storage.backend, BackendKind::Memory);
    assert!(!config.storage.database_path.is_empty());
    Ok(())
}

#[test]
fn blank_database_path_falls_back_to_profile_default() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[storage]\ndatabase_path = \"  \"\n")?;

    let config = Config::load_from_path(&path, Profile::Dev)?;
    assert!(config.storage.database_path.ends_with("tasks.db"));
    assert!(config.storage.database_path.contains("taskflow-dev"));
    Ok(())
}

#[test]
fn unknown_backend_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[storage]\nbackend = \"cloud\"\n")?;

    assert!(Config::load_from_path(&path, Profile::Prod).is_err());
    Ok(())
}

#[test]
fn saved_config_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");

    let mut config = Config::for_profile(Profile::Dev);
    config.storage.backend = BackendKind::Memory;
    config.display.date_format = "%d/%m".to_string();
    config.save_to_path(&path)?;

    let loaded = Config::load_from_path(&path, Profile::Dev)?;
    assert_eq!(loaded.storage.backend, BackendKind::Memory);
    assert_eq!(loaded.display.date_format, "%d/%m");
    assert_eq!(loaded.config_version, Some(1));
    Ok(())
}

#[test]
fn unrenderable_date_format_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[display]\ndate_format = \"%Q\"\n")?;

    let err = Config::load_from_path(&path, Profile::Prod).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDateFormat(ref f) if f == "%Q"));
    Ok(())
}

#[test]
fn custom_date_format_is_accepted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[display]\ndate_format = \"%a %d %b\"\n")?;

    let config = Config::load_from_path(&path, Profile::Prod)?;
    assert_eq!(config.display.date_format, "%a %d %b");
    Ok(())
}
