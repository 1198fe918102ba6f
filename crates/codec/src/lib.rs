//! # pinba-codec
//!
//! Pinba request message layout and its protobuf wire encoding.
//!
//! - **Schema** - `MessageSchema`, one ordered field table per `SchemaVersion`
//! - **Message** - `PinbaMessage`, built from an `AggregatedSummary` and a `MessageHeader`
//! - **Encoder** - `MessageEncoder`, `ProtobufEncoder`
//!
//! Varint and key primitives come from `prost::encoding`; this crate only
//! decides which fields go on the wire and in which order.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod encoder;
pub mod error;
pub mod message;
pub mod schema;

pub use encoder::{MessageEncoder, ProtobufEncoder};
pub use error::EncodeError;
pub use message::{FieldValue, MessageHeader, MessageOverrides, PinbaMessage, bytes_u32, seconds_f32};
pub use schema::{
    Cardinality, FieldId, FieldSpec, FieldType, MessageSchema, SchemaVersion, UnknownSchemaVersion,
};

/// Returns the codec crate version.
#[must_use]
pub const fn codec_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_crate_compiles() {
        assert!(!codec_crate_version().is_empty());
    }
}
