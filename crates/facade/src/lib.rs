//! # pinba-facade
//!
//! Request-level API for consumers (CLI and embedding services).
//!
//! A [`Request`] owns request metadata, request tags and a timer store.
//! [`Request::flush`] aggregates stopped timers, encodes one datagram and
//! sends it through the configured transport without blocking the caller.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod flush;
mod request;

pub use flush::{FlushHandle, FlushOptions};
pub use request::{Request, RequestDeps, RequestInfo, UNKNOWN_HOSTNAME};

pub use pinba_codec::{MessageOverrides, PinbaMessage, SchemaVersion};
pub use pinba_config::{
    PinbaConfig, PinbaEnv, ValidatedPinbaConfig, load_pinba_config_from_path,
    load_pinba_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use pinba_domain::{TagMap, TimerData, TimerHandle, TimerInfo};
pub use pinba_ports::PinbaEndpoint;
pub use pinba_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};

/// Returns the facade crate version.
#[must_use]
pub const fn facade_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
