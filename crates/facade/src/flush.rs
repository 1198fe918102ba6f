//! Flush: aggregate, encode, clear, then hand the datagram to the transport.

use crate::request::Request;
use pinba_codec::MessageOverrides;
use pinba_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Flush knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushOptions {
    /// Report only timers that are already stopped; running ones are dropped.
    pub only_stopped: bool,
    /// Also clear request tags and restart the request clock.
    pub reset: bool,
    /// Per-flush header overrides. The request itself is not modified.
    pub overrides: MessageOverrides,
}

impl FlushOptions {
    /// Set `only_stopped`.
    #[must_use]
    pub fn only_stopped(mut self, only_stopped: bool) -> Self {
        self.only_stopped = only_stopped;
        self
    }

    /// Set `reset`.
    #[must_use]
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Set header overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: MessageOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Pending send started by [`Request::flush`].
///
/// Dropping the handle does not cancel the send.
#[derive(Debug)]
pub struct FlushHandle {
    payload_len: usize,
    task: JoinHandle<Result<()>>,
}

impl FlushHandle {
    /// Encoded datagram size in bytes.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Wait for the transport to finish and return its outcome.
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(ErrorEnvelope::unexpected(
                ErrorCode::new("transport", "send_failed"),
                format!("pinba send task did not complete: {join_error}"),
                ErrorClass::NonRetriable,
            )),
        }
    }
}

impl Request {
    /// Report the request to the collector.
    ///
    /// Encoding happens synchronously; on success timers are cleared before
    /// the datagram is sent on the current tokio runtime. Encode failures
    /// leave every timer in place and send nothing. Without a runtime the
    /// call fails before touching any state.
    pub fn flush(&mut self, options: FlushOptions) -> Result<FlushHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("pinba", "runtime_unavailable"),
                format!("flush requires a tokio runtime: {error}"),
            )
        })?;

        let now = self.deps.clock.now();
        if !options.only_stopped {
            self.timers.stop_all(now);
        }

        let message = self.build_message(now, &options.overrides);
        let payload = self.deps.encoder.encode(&self.message_schema, &message)?;
        let payload_len = payload.len();
        let groups = message.timer_hit_count.len();

        self.timers.clear();
        if options.reset {
            self.tags.clear();
            self.started_at = now;
        }

        let target = self.endpoint();
        tracing::debug!(
            endpoint = %target,
            bytes = payload_len,
            groups,
            dictionary = message.dictionary.len(),
            reset = options.reset,
            "pinba flush"
        );

        let transport = Arc::clone(&self.deps.transport);
        let task = runtime.spawn(async move {
            let outcome = transport.send(target.clone(), payload).await;
            if let Err(error) = &outcome {
                tracing::warn!(
                    endpoint = %target,
                    code = %error.code,
                    error = %error.message,
                    "pinba send failed"
                );
            }
            outcome
        });

        Ok(FlushHandle { payload_len, task })
    }
}
