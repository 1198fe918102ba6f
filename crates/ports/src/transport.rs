//! Datagram transport boundary contract.

use crate::BoxFuture;
use bytes::Bytes;
use pinba_shared::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collector address: host name or IP literal plus UDP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinbaEndpoint {
    /// Host name or IP literal.
    pub host: Box<str>,
    /// UDP port.
    pub port: u16,
}

impl PinbaEndpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(host: impl Into<Box<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PinbaEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bare IPv6 literals need brackets to stay parseable as `host:port`.
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

/// Boundary contract for fire-and-forget datagram delivery.
///
/// One call sends exactly one datagram. Implementations do not retry.
pub trait DatagramTransport: Send + Sync {
    /// Send `payload` to `target`.
    fn send(&self, target: PinbaEndpoint, payload: Bytes) -> BoxFuture<'_, Result<()>>;
}
