//! In-memory adapters for tests.

use bytes::Bytes;
use pinba_ports::{BoxFuture, ClockPort, DatagramTransport, PinbaEndpoint, ResourceUsage, SystemProbePort};
use pinba_shared::{ErrorEnvelope, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A datagram captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    /// Destination.
    pub target: PinbaEndpoint,
    /// Payload bytes.
    pub payload: Bytes,
}

/// Transport that records datagrams instead of sending them.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentDatagram>>>,
    failure: Option<ErrorEnvelope>,
}

impl RecordingTransport {
    /// Transport that accepts every datagram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that records every datagram and then fails with `error`.
    #[must_use]
    pub fn failing(error: ErrorEnvelope) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(error),
        }
    }

    /// Datagrams recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DatagramTransport for RecordingTransport {
    fn send(&self, target: PinbaEndpoint, payload: Bytes) -> BoxFuture<'_, Result<()>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentDatagram { target, payload });
        let outcome = self.failure.clone().map_or(Ok(()), Err);
        Box::pin(async move { outcome })
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Probe returning fixed values.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    /// Host name to report.
    pub hostname: Option<String>,
    /// Usage to report.
    pub usage: ResourceUsage,
}

impl FixedProbe {
    /// Probe reporting `hostname` and zero usage.
    #[must_use]
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            usage: ResourceUsage::default(),
        }
    }
}

impl SystemProbePort for FixedProbe {
    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn resource_usage(&self) -> ResourceUsage {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinba_shared::{ErrorClass, ErrorCode};

    #[tokio::test]
    async fn recording_transport_shares_log_across_clones() -> Result<()> {
        let transport = RecordingTransport::new();
        let handle = transport.clone();

        transport
            .send(PinbaEndpoint::new("127.0.0.1", 30002), Bytes::from_static(b"abc"))
            .await?;

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.first().map(|datagram| datagram.payload.as_ref()), Some(&b"abc"[..]));
        Ok(())
    }

    #[tokio::test]
    async fn failing_transport_records_then_errors() {
        let error = ErrorEnvelope::unexpected(
            ErrorCode::new("transport", "send_failed"),
            "boom",
            ErrorClass::NonRetriable,
        );
        let transport = RecordingTransport::failing(error.clone());

        let result = transport
            .send(PinbaEndpoint::new("127.0.0.1", 1), Bytes::new())
            .await;
        assert_eq!(result, Err(error));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now() - start, Duration::from_millis(5));
    }
}
