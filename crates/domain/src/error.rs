//! Timer lifecycle errors.

use crate::timer::TimerHandle;
use pinba_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// Timer operation that referenced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOperation {
    /// `stop`.
    Stop,
    /// `delete`.
    Delete,
    /// Tag or data merge/replace.
    Modify,
    /// `info`.
    GetInfo,
}

impl TimerOperation {
    /// Stable label used in messages and error metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::Modify => "modify",
            Self::GetInfo => "get info for",
        }
    }
}

impl fmt::Display for TimerOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Misuse of the timer API. Always raised synchronously.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimerError {
    /// The handle was never issued by this store, or was deleted or flushed.
    #[error("cannot {operation} nonexistent timer {handle}")]
    NotFound {
        /// Handle that was referenced.
        handle: TimerHandle,
        /// Operation that was attempted.
        operation: TimerOperation,
    },
    /// `stop` was called on a timer that is already stopped.
    #[error("cannot stop already stopped timer {handle}")]
    AlreadyStopped {
        /// Handle that was referenced.
        handle: TimerHandle,
    },
    /// A pre-measured value was negative, NaN or infinite.
    #[error("timer value must be a finite, non-negative number of seconds (got {value})")]
    InvalidValue {
        /// Rejected value.
        value: f64,
    },
}

impl TimerError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::new("timer", "not_found"),
            Self::AlreadyStopped { .. } => ErrorCode::new("timer", "already_stopped"),
            Self::InvalidValue { .. } => ErrorCode::new("timer", "invalid_value"),
        }
    }
}

impl From<TimerError> for ErrorEnvelope {
    fn from(error: TimerError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            TimerError::NotFound { handle, operation } => envelope
                .with_metadata("handle", handle.to_string())
                .with_metadata("operation", operation.as_str()),
            TimerError::AlreadyStopped { handle } => {
                envelope.with_metadata("handle", handle.to_string())
            },
            TimerError::InvalidValue { value } => envelope.with_metadata("value", value.to_string()),
        }
    }
}
