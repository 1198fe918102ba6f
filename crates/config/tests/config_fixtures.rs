//! Integration tests for parsing and loading config fixtures.

use pinba_codec::SchemaVersion;
use pinba_config::{
    PinbaEnv, load_pinba_config_from_path, parse_pinba_config_json, parse_pinba_config_toml,
};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    Ok(fs::read_to_string(fixture_path(relative))?)
}

#[test]
fn parses_valid_json_fixture_and_normalizes() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("pinba.valid.json")?;
    let config = parse_pinba_config_json(&contents)?;
    let config = config.as_ref();

    assert_eq!(config.hostname.as_deref(), Some("web-1"), "hostname should be trimmed");
    assert_eq!(config.server_name, "example.com");
    assert_eq!(config.script_name, "/checkout");
    assert_eq!(config.schema, "https");
    assert_eq!(config.pinba_server, "pinba.internal");
    assert_eq!(config.pinba_port, 30003);
    assert_eq!(config.schema_version, SchemaVersion::V2);
    Ok(())
}

#[test]
fn parses_valid_toml_fixture_with_defaults() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("pinba.valid.toml")?;
    let config = parse_pinba_config_toml(&contents)?;
    let config = config.as_ref();

    assert_eq!(config.script_name, "/cron/cleanup");
    assert_eq!(config.pinba_server, "10.1.2.3");
    assert_eq!(config.pinba_port, 30002);
    assert_eq!(config.schema_version, SchemaVersion::V1);
    assert_eq!(config.hostname, None);
    Ok(())
}

#[test]
fn invalid_port_fixture_surfaces_field() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("pinba.invalid-port.json")?;
    let Err(error) = parse_pinba_config_json(&contents) else {
        return Err("port 0 must be rejected".into());
    };

    assert!(error.code.is("config", "invalid_port"));
    assert_eq!(error.metadata_value("field"), Some("pinbaPort"));
    Ok(())
}

#[test]
fn loads_by_extension_from_disk() -> Result<(), Box<dyn Error>> {
    let env = PinbaEnv::default();

    let json = load_pinba_config_from_path(Some(&fixture_path("pinba.valid.json")), &env)?;
    let toml = load_pinba_config_from_path(Some(&fixture_path("pinba.valid.toml")), &env)?;

    assert_eq!(json.as_ref().pinba_port, 30003);
    assert_eq!(toml.as_ref().schema_version, SchemaVersion::V1);
    Ok(())
}
