//! Encoding errors.

use pinba_shared::{ErrorCode, ErrorEnvelope};

/// Failure to lay a message out on the wire. Both cases are invariant
/// violations: the encoder or the schema table is wrong, not the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Written bytes differ from the precomputed length.
    #[error("encoded {actual} bytes but expected {expected}")]
    SizeMismatch {
        /// Length computed before writing.
        expected: usize,
        /// Length actually written.
        actual: usize,
    },
    /// A schema row does not match the shape of the message value.
    #[error("field {number} ({field}) {reason}")]
    TypeMismatch {
        /// Field name from the schema row.
        field: &'static str,
        /// Field number from the schema row.
        number: u32,
        /// What did not match.
        reason: &'static str,
    },
}

impl From<EncodeError> for ErrorEnvelope {
    fn from(error: EncodeError) -> Self {
        let message = error.to_string();
        match error {
            EncodeError::SizeMismatch { expected, actual } => Self::invariant(
                ErrorCode::new("codec", "encoding_size_mismatch"),
                message,
            )
            .with_metadata("expected", expected.to_string())
            .with_metadata("actual", actual.to_string()),
            EncodeError::TypeMismatch { field, number, .. } => {
                Self::invariant(ErrorCode::new("codec", "type_mismatch"), message)
                    .with_metadata("field", field)
                    .with_metadata("number", number.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinba_shared::ErrorKind;

    #[test]
    fn size_mismatch_is_an_invariant_violation() {
        let envelope = ErrorEnvelope::from(EncodeError::SizeMismatch {
            expected: 10,
            actual: 12,
        });

        assert_eq!(envelope.kind, ErrorKind::Invariant);
        assert!(envelope.code.is("codec", "encoding_size_mismatch"));
        assert_eq!(envelope.metadata_value("expected"), Some("10"));
        assert_eq!(envelope.metadata_value("actual"), Some("12"));
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let error = EncodeError::TypeMismatch {
            field: "status",
            number: 16,
            reason: "expects a uint32 value",
        };
        assert_eq!(error.to_string(), "field 16 (status) expects a uint32 value");

        let envelope = ErrorEnvelope::from(error);
        assert!(envelope.code.is("codec", "type_mismatch"));
        assert_eq!(envelope.metadata_value("field"), Some("status"));
    }
}
