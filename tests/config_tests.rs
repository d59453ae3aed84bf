use std::io::Write;
use strata::config::{AppConfig, Environment, LogFormat};
use strata::{App, Context, RawRequest};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml_file() {
    let file = write_config(
        "environment: development\nlog:\n  level: strata=debug\n  format: pretty\n",
    );
    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.log.level, "strata=debug");
    assert_eq!(config.log.format, LogFormat::Pretty);
}

#[test]
fn test_unknown_environment_falls_back_to_production() {
    let file = write_config("environment: staging\n");
    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.environment, Environment::Production);
}

#[test]
fn test_empty_file_is_default() {
    let file = write_config("");
    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_missing_file_error_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = AppConfig::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
fn test_malformed_yaml_is_error() {
    let file = write_config("log: [unclosed\n");
    assert!(AppConfig::from_yaml_file(file.path()).is_err());
}

#[test]
fn test_app_uses_configured_environment() {
    let file = write_config("environment: testing\n");
    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    let mut app = App::with_config(&config);
    app.get("/", |c: &mut Context| c.text(c.environment().as_str()));

    assert_eq!(app.environment(), Environment::Testing);
    assert_eq!(app.handle(RawRequest::get("/")).body_string(), "testing");
}
