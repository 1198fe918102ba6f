//! # pinba-adapters
//!
//! Adapter implementations for ports (UDP transport, clock, process probe).
//! The in-memory doubles in `memory` are only built with the `testkit`
//! feature.
//! This crate depends on `ports` and `shared`.

pub mod clock;
#[cfg(any(test, feature = "testkit"))]
pub mod memory;
pub mod system;
pub mod udp;

pub use clock::SystemClock;
#[cfg(any(test, feature = "testkit"))]
pub use memory::{FixedProbe, ManualClock, RecordingTransport, SentDatagram};
pub use system::SysinfoProbe;
pub use udp::UdpTransport;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinba_ports::ports_crate_version;
    use pinba_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;
        let mut in_dev_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                in_dev_deps = line == "[dev-dependencies]";
                continue;
            }
            if !(in_deps || in_dev_deps) {
                continue;
            }
            if line.starts_with("pinba-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn adapters_do_not_depend_on_facade_or_domain() {
        let deps = workspace_deps();
        let forbidden = ["pinba-facade", "pinba-domain", "pinba-codec"];

        for dep in &deps {
            assert!(
                !forbidden.contains(&dep.as_str()),
                "forbidden dependency found: {dep}"
            );
        }
    }

    #[test]
    fn adapters_can_use_ports_and_shared() {
        assert!(!adapters_crate_version().is_empty());
        assert!(!ports_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
