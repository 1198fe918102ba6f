//! Pinba client configuration schema.
//!
//! `PinbaConfig` is the raw, serde-facing shape (camelCase keys, unknown keys
//! rejected). `ValidatedPinbaConfig` is what the rest of the workspace
//! consumes: it can only be obtained through `validate_and_normalize`.

use pinba_codec::SchemaVersion;
use pinba_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default collector host.
pub const DEFAULT_PINBA_SERVER: &str = "127.0.0.1";
/// Default collector UDP port.
pub const DEFAULT_PINBA_PORT: u16 = 30002;

/// Raw client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PinbaConfig {
    /// Host name reported in every request. `None` uses the machine host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Virtual server name.
    pub server_name: String,
    /// Script or endpoint name.
    pub script_name: String,
    /// Request scheme; empty means not reported.
    pub schema: String,
    /// Collector host name or IP literal.
    pub pinba_server: String,
    /// Collector UDP port.
    pub pinba_port: u16,
    /// Message layout understood by the collector.
    pub schema_version: SchemaVersion,
}

impl Default for PinbaConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            server_name: String::new(),
            script_name: String::new(),
            schema: String::new(),
            pinba_server: DEFAULT_PINBA_SERVER.to_owned(),
            pinba_port: DEFAULT_PINBA_PORT,
            schema_version: SchemaVersion::default(),
        }
    }
}

impl PinbaConfig {
    /// Trim string fields and check the collector address.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedPinbaConfig, ConfigSchemaError> {
        self.hostname = self
            .hostname
            .map(|hostname| hostname.trim().to_owned())
            .filter(|hostname| !hostname.is_empty());
        self.server_name = self.server_name.trim().to_owned();
        self.script_name = self.script_name.trim().to_owned();
        self.schema = self.schema.trim().to_owned();
        self.pinba_server = self.pinba_server.trim().to_owned();

        if self.pinba_server.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                field: "pinbaServer",
            });
        }
        if self.pinba_port == 0 {
            return Err(ConfigSchemaError::InvalidPort {
                field: "pinbaPort",
                value: self.pinba_port,
            });
        }

        Ok(ValidatedPinbaConfig { raw: self })
    }
}

/// Configuration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPinbaConfig {
    raw: PinbaConfig,
}

impl ValidatedPinbaConfig {
    /// Validated values.
    #[must_use]
    pub const fn as_ref(&self) -> &PinbaConfig {
        &self.raw
    }

    /// Consume into the validated values.
    #[must_use]
    pub fn into_inner(self) -> PinbaConfig {
        self.raw
    }
}

impl Default for ValidatedPinbaConfig {
    fn default() -> Self {
        Self {
            raw: PinbaConfig::default(),
        }
    }
}

/// Typed validation errors for the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// A required string field is empty after trimming.
    EmptyValue {
        /// Field name in the config file.
        field: &'static str,
    },
    /// A port is outside the usable range.
    InvalidPort {
        /// Field name in the config file.
        field: &'static str,
        /// Value provided.
        value: u16,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_value"),
            Self::InvalidPort { .. } => ErrorCode::new("config", "invalid_port"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { field } => write!(formatter, "{field} must be non-empty"),
            Self::InvalidPort { field, value } => {
                write!(formatter, "{field} must be between 1 and 65535 (got {value})")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::EmptyValue { field } => envelope.with_metadata("field", field),
            ConfigSchemaError::InvalidPort { field, value } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value.to_string()),
        }
    }
}

/// Parse a config from a JSON string, applying validation and normalization.
pub fn parse_pinba_config_json(input: &str) -> Result<ValidatedPinbaConfig, ErrorEnvelope> {
    let config: PinbaConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a config from a TOML string, applying validation and normalization.
pub fn parse_pinba_config_toml(input: &str) -> Result<ValidatedPinbaConfig, ErrorEnvelope> {
    let config: PinbaConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}
