//! # pinba-config
//!
//! Configuration schema, validation, and env/file loading for the pinba
//! client. This crate depends on `codec` (for `SchemaVersion`) and `shared`.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use schema::{
    ConfigSchemaError, DEFAULT_PINBA_PORT, DEFAULT_PINBA_SERVER, PinbaConfig, ValidatedPinbaConfig,
    parse_pinba_config_json, parse_pinba_config_toml,
};

pub use env::{EnvParseError, PinbaEnv, apply_env_overrides};
pub use load::{
    load_pinba_config_from_path, load_pinba_config_std_env, to_pretty_json, to_pretty_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinba_codec::codec_crate_version;
    use pinba_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_codec_and_shared() {
        assert!(!codec_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
