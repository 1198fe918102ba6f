//! Environment variable parsing and merging.
//!
//! Parsing is strict: a variable that is present must hold a usable value.
//! Absent variables leave the underlying config untouched.

use crate::schema::{PinbaConfig, ValidatedPinbaConfig};
use pinba_codec::SchemaVersion;
use pinba_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;

/// Overrides `hostname`.
pub const ENV_HOSTNAME: &str = "PINBA_HOSTNAME";
/// Overrides `serverName`.
pub const ENV_SERVER_NAME: &str = "PINBA_SERVER_NAME";
/// Overrides `scriptName`.
pub const ENV_SCRIPT_NAME: &str = "PINBA_SCRIPT_NAME";
/// Overrides `schema`.
pub const ENV_SCHEMA: &str = "PINBA_SCHEMA";
/// Overrides `pinbaServer`.
pub const ENV_SERVER: &str = "PINBA_SERVER";
/// Overrides `pinbaPort`.
pub const ENV_PORT: &str = "PINBA_PORT";
/// Overrides `schemaVersion`.
pub const ENV_SCHEMA_VERSION: &str = "PINBA_SCHEMA_VERSION";

const ALL_VARS: [&str; 7] = [
    ENV_HOSTNAME,
    ENV_SERVER_NAME,
    ENV_SCRIPT_NAME,
    ENV_SCHEMA,
    ENV_SERVER,
    ENV_PORT,
    ENV_SCHEMA_VERSION,
];

/// Parsed `PINBA_*` overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinbaEnv {
    /// Override for `hostname`.
    pub hostname: Option<Box<str>>,
    /// Override for `serverName`.
    pub server_name: Option<Box<str>>,
    /// Override for `scriptName`.
    pub script_name: Option<Box<str>>,
    /// Override for `schema`.
    pub schema: Option<Box<str>>,
    /// Override for `pinbaServer`.
    pub pinba_server: Option<Box<str>>,
    /// Override for `pinbaPort`.
    pub pinba_port: Option<u16>,
    /// Override for `schemaVersion`.
    pub schema_version: Option<SchemaVersion>,
}

impl PinbaEnv {
    /// Parse overrides from an explicit variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            hostname: parse_optional_trimmed_string(map, ENV_HOSTNAME)?,
            server_name: parse_optional_trimmed_string(map, ENV_SERVER_NAME)?,
            script_name: parse_optional_trimmed_string(map, ENV_SCRIPT_NAME)?,
            schema: parse_optional_trimmed_string(map, ENV_SCHEMA)?,
            pinba_server: parse_optional_trimmed_string(map, ENV_SERVER)?,
            pinba_port: parse_optional_port(map, ENV_PORT)?,
            schema_version: parse_optional_schema_version(map, ENV_SCHEMA_VERSION)?,
        })
    }

    /// Parse overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_owned(), value);
            }
        }
        Self::from_map(&map)
    }

    /// Returns true when no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply env overrides on top of `base`, then validate.
pub fn apply_env_overrides(
    base: PinbaConfig,
    env: &PinbaEnv,
) -> Result<ValidatedPinbaConfig, ErrorEnvelope> {
    let mut config = base;
    if let Some(hostname) = &env.hostname {
        config.hostname = Some(hostname.to_string());
    }
    set_string(&mut config.server_name, env.server_name.as_deref());
    set_string(&mut config.script_name, env.script_name.as_deref());
    set_string(&mut config.schema, env.schema.as_deref());
    set_string(&mut config.pinba_server, env.pinba_server.as_deref());
    if let Some(port) = env.pinba_port {
        config.pinba_port = port;
    }
    if let Some(version) = env.schema_version {
        config.schema_version = version;
    }

    config.validate_and_normalize().map_err(Into::into)
}

fn set_string(target: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        value.clone_into(target);
    }
}

/// Typed errors for `PINBA_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be a port number"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidInt { var, value } | EnvParseError::InvalidEnum { var, value } => {
                envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", value)
            },
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_port(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u16>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<u16>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_schema_version(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SchemaVersion>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<SchemaVersion>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidEnum {
            var,
            value: trimmed.into_string(),
        })
}
