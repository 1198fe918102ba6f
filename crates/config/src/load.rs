//! Config loading helpers (env + file).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{PinbaConfig, PinbaEnv, ValidatedPinbaConfig, apply_env_overrides};
use pinba_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the config from an optional file path (`.json` or `.toml`).
pub fn load_pinba_config_from_path(
    config_path: Option<&Path>,
    env: &PinbaEnv,
) -> Result<ValidatedPinbaConfig, ErrorEnvelope> {
    let config = match config_path {
        None => PinbaConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            tracing::debug!(path = %path.display(), ?format, "loaded pinba config file");
            parse_config_unvalidated(&config_text, format)?
        },
    };

    apply_env_overrides(config, env)
}

/// Load the config from std env and an optional file path.
pub fn load_pinba_config_std_env(
    config_path: Option<&Path>,
) -> Result<ValidatedPinbaConfig, ErrorEnvelope> {
    let env = PinbaEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_pinba_config_from_path(config_path, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &PinbaConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &PinbaConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(input: &str, format: ConfigFormat) -> Result<PinbaConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinba_codec::SchemaVersion;

    #[test]
    fn unknown_extension_is_rejected() {
        let result = load_pinba_config_from_path(Some(Path::new("pinba.yaml")), &PinbaEnv::default());
        assert!(matches!(result, Err(error) if error.code.is("config", "unsupported_format")));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("/nonexistent/pinba.json");
        let result = load_pinba_config_from_path(Some(path), &PinbaEnv::default());

        let error = result.err();
        assert_eq!(
            error.as_ref().map(|error| error.code.code()),
            Some("config_file_not_found")
        );
        assert_eq!(
            error.as_ref().and_then(|error| error.metadata_value("path")),
            Some("/nonexistent/pinba.json")
        );
    }

    #[test]
    fn pretty_output_round_trips() -> Result<(), ErrorEnvelope> {
        let config = PinbaConfig {
            schema_version: SchemaVersion::V1,
            ..PinbaConfig::default()
        };

        let json = to_pretty_json(&config)?;
        assert!(json.ends_with('\n'));
        assert!(json.contains("\"schemaVersion\": \"v1\""));

        let toml = to_pretty_toml(&config)?;
        assert!(toml.contains("pinbaPort = 30002"));
        Ok(())
    }
}
