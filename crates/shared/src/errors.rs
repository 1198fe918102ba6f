//! Error envelope shared by every pinba crate.
//!
//! Component errors (`TimerError`, `EncodeError`, config errors) convert into
//! an [`ErrorEnvelope`] at their crate boundary. Callers branch on the
//! [`ErrorCode`]; kind and class say who is at fault and whether repeating
//! the call could help.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::{fmt, io};

/// Metadata attached to errors for diagnostics.
pub type ErrorMetadata = BTreeMap<String, String>;

/// Who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller misuse, invalid input or configuration.
    Expected,
    /// A bug in the schema, codec or aggregation.
    Invariant,
    /// The environment failed: I/O, sockets, name resolution.
    Unexpected,
}

impl ErrorKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expected => "expected",
            Self::Invariant => "invariant",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Whether repeating the failed call could succeed.
///
/// Nothing in the client retries on its own; the class is informational for
/// callers that wrap a flush in their own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Repeating the operation may succeed.
    Retriable,
    /// Repeating the operation will fail the same way.
    NonRetriable,
}

impl ErrorClass {
    /// Returns true for [`ErrorClass::Retriable`].
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }

    /// Datagram sends fail transiently when the socket buffer is full or the
    /// route is briefly unavailable.
    #[must_use]
    pub const fn for_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::AddrNotAvailable => Self::Retriable,
            _ => Self::NonRetriable,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retriable => "retriable",
            Self::NonRetriable => "non-retriable",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stable `namespace:code` identifier, e.g. `timer:not_found`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    namespace: Cow<'static, str>,
    code: Cow<'static, str>,
}

impl ErrorCode {
    /// Build a code. Both parts are usually string literals.
    pub fn new(namespace: impl Into<Cow<'static, str>>, code: impl Into<Cow<'static, str>>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
        }
    }

    /// Generic I/O failure.
    #[must_use]
    pub const fn io() -> Self {
        Self {
            namespace: Cow::Borrowed("io"),
            code: Cow::Borrowed("other"),
        }
    }

    /// Failure with no more specific code.
    #[must_use]
    pub const fn internal() -> Self {
        Self {
            namespace: Cow::Borrowed("pinba"),
            code: Cow::Borrowed("internal"),
        }
    }

    /// Namespace part (`timer`, `codec`, `config`, `transport`, ...).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identifier within the namespace.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns true when both parts match.
    #[must_use]
    pub fn is(&self, namespace: &str, code: &str) -> bool {
        self.namespace == namespace && self.code == code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.code)
    }
}

/// The single error type crossing crate boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Who is at fault.
    pub kind: ErrorKind,
    /// Retry classification.
    pub class: ErrorClass,
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Handles, field numbers, targets and similar context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ErrorMetadata,
}

impl ErrorEnvelope {
    fn build(kind: ErrorKind, class: ErrorClass, code: ErrorCode, message: String) -> Self {
        Self {
            kind,
            class,
            code,
            message,
            metadata: ErrorMetadata::new(),
        }
    }

    /// Caller error; never retriable.
    pub fn expected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::build(ErrorKind::Expected, ErrorClass::NonRetriable, code, message.into())
    }

    /// Internal bug; never retriable.
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::build(ErrorKind::Invariant, ErrorClass::NonRetriable, code, message.into())
    }

    /// Environment failure with an explicit retry class.
    pub fn unexpected(code: ErrorCode, message: impl Into<String>, class: ErrorClass) -> Self {
        Self::build(ErrorKind::Unexpected, class, code, message.into())
    }

    /// Attach a single metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a metadata value by key.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}: {} ({}, {})",
            self.code, self.message, self.kind, self.class
        )
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<io::Error> for ErrorEnvelope {
    fn from(error: io::Error) -> Self {
        let kind = error.kind();
        let code = match kind {
            io::ErrorKind::NotFound => ErrorCode::new("io", "not_found"),
            io::ErrorKind::PermissionDenied => ErrorCode::new("io", "permission_denied"),
            io::ErrorKind::TimedOut => ErrorCode::new("io", "timeout"),
            _ => ErrorCode::io(),
        };
        Self::unexpected(code, error.to_string(), ErrorClass::for_io(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_class() {
        let expected = ErrorEnvelope::expected(ErrorCode::new("config", "invalid_port"), "invalid");
        assert_eq!(expected.kind, ErrorKind::Expected);
        assert_eq!(expected.class, ErrorClass::NonRetriable);

        let invariant = ErrorEnvelope::invariant(ErrorCode::new("codec", "type_mismatch"), "boom");
        assert_eq!(invariant.kind, ErrorKind::Invariant);
        assert!(!invariant.class.is_retriable());

        let unexpected = ErrorEnvelope::unexpected(
            ErrorCode::new("transport", "send_failed"),
            "unreachable",
            ErrorClass::Retriable,
        );
        assert_eq!(unexpected.kind, ErrorKind::Unexpected);
        assert!(unexpected.class.is_retriable());
    }

    #[test]
    fn io_errors_are_classified() {
        let envelope = ErrorEnvelope::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(envelope.kind, ErrorKind::Unexpected);
        assert_eq!(envelope.code, ErrorCode::io());
        assert!(envelope.class.is_retriable());

        let envelope = ErrorEnvelope::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(envelope.code.is("io", "permission_denied"));
        assert!(!envelope.class.is_retriable());
    }

    #[test]
    fn code_matching_and_metadata_lookup() {
        let error = ErrorEnvelope::expected(ErrorCode::new("timer", "not_found"), "missing")
            .with_metadata("handle", "7");

        assert!(error.code.is("timer", "not_found"));
        assert!(!error.code.is("timer", "already_stopped"));
        assert_eq!(error.metadata_value("handle"), Some("7"));
        assert_eq!(error.to_string(), "timer:not_found: missing (expected, non-retriable)");
    }

    #[test]
    fn envelope_serializes_without_empty_metadata() -> Result<(), serde_json::Error> {
        let error = ErrorEnvelope::expected(ErrorCode::new("config", "empty_value"), "bad");
        let value = serde_json::to_value(&error)?;
        assert!(value.get("metadata").is_none());
        assert_eq!(
            value.get("code"),
            Some(&serde_json::json!({ "namespace": "config", "code": "empty_value" }))
        );

        let back: ErrorEnvelope = serde_json::from_value(value)?;
        assert_eq!(back, error);
        Ok(())
    }
}
