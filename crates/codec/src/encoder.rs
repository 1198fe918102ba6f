//! Protobuf wire encoding of Pinba messages.
//!
//! Every field is `key = (number << 3) | wire_type` as a varint followed by
//! its payload. Repeated fields are written unpacked, one key per element.

use crate::error::EncodeError;
use crate::message::{FieldValue, PinbaMessage};
use crate::schema::{Cardinality, FieldSpec, FieldType, MessageSchema};
use bytes::{BufMut, Bytes, BytesMut};
use prost::encoding::{WireType, encode_key, encode_varint, encoded_len_varint, key_len};

const FLOAT_LEN: usize = 4;

/// Lays out a message according to a schema.
///
/// Implementors supply the length computation and the raw writer; the
/// provided [`MessageEncoder::encode`] ties them together and rejects any
/// output whose length disagrees with the precomputed one.
pub trait MessageEncoder: Send + Sync {
    /// Exact number of bytes `encode_raw` will write.
    fn encoded_len(&self, schema: &MessageSchema, message: &PinbaMessage) -> Result<usize, EncodeError>;

    /// Append the encoded message to `buf`.
    fn encode_raw(
        &self,
        schema: &MessageSchema,
        message: &PinbaMessage,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError>;

    /// Encode into a fresh buffer, checking the written length.
    fn encode(&self, schema: &MessageSchema, message: &PinbaMessage) -> Result<Bytes, EncodeError> {
        let expected = self.encoded_len(schema, message)?;
        let mut buf = BytesMut::with_capacity(expected);
        self.encode_raw(schema, message, &mut buf)?;
        let actual = buf.len();
        if actual != expected {
            return Err(EncodeError::SizeMismatch { expected, actual });
        }
        Ok(buf.freeze())
    }
}

/// Schema-driven protobuf encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufEncoder;

impl ProtobufEncoder {
    /// Create the encoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageEncoder for ProtobufEncoder {
    fn encoded_len(&self, schema: &MessageSchema, message: &PinbaMessage) -> Result<usize, EncodeError> {
        schema.fields().iter().try_fold(0usize, |total, spec| {
            let value = checked_value(spec, message)?;
            Ok(total + field_len(spec.number, value))
        })
    }

    fn encode_raw(
        &self,
        schema: &MessageSchema,
        message: &PinbaMessage,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError> {
        for spec in schema.fields() {
            let value = checked_value(spec, message)?;
            write_field(spec.number, value, buf);
        }
        Ok(())
    }
}

/// Read a field from the message and verify it fits the schema row.
fn checked_value<'a>(spec: &FieldSpec, message: &'a PinbaMessage) -> Result<FieldValue<'a>, EncodeError> {
    let value = message.field_value(spec.id);
    let fits = match (spec.cardinality, spec.ty, value) {
        (Cardinality::Required | Cardinality::Optional, FieldType::String, FieldValue::Str(_))
        | (Cardinality::Required | Cardinality::Optional, FieldType::Uint32, FieldValue::Uint32(_))
        | (Cardinality::Required | Cardinality::Optional, FieldType::Float, FieldValue::Float(_))
        | (Cardinality::Optional, _, FieldValue::Absent)
        | (Cardinality::Repeated, FieldType::String, FieldValue::Strs(_))
        | (Cardinality::Repeated, FieldType::Uint32, FieldValue::Uint32s(_))
        | (Cardinality::Repeated, FieldType::Float, FieldValue::Floats(_)) => true,
        _ => false,
    };
    if fits {
        return Ok(value);
    }
    Err(EncodeError::TypeMismatch {
        field: spec.name,
        number: spec.number,
        reason: mismatch_reason(spec, value),
    })
}

const fn mismatch_reason(spec: &FieldSpec, value: FieldValue<'_>) -> &'static str {
    match (spec.cardinality, value) {
        (Cardinality::Required, FieldValue::Absent) => "is required but not set",
        (Cardinality::Repeated, _) => "expects a repeated value",
        (_, FieldValue::Strs(_) | FieldValue::Uint32s(_) | FieldValue::Floats(_)) => {
            "expects a single value"
        },
        _ => match spec.ty {
            FieldType::String => "expects a string value",
            FieldType::Uint32 => "expects a uint32 value",
            FieldType::Float => "expects a float value",
        },
    }
}

fn string_len(number: u32, value: &str) -> usize {
    key_len(number) + encoded_len_varint(value.len() as u64) + value.len()
}

fn uint32_len(number: u32, value: u32) -> usize {
    key_len(number) + encoded_len_varint(u64::from(value))
}

fn field_len(number: u32, value: FieldValue<'_>) -> usize {
    match value {
        FieldValue::Str(value) => string_len(number, value),
        FieldValue::Uint32(value) => uint32_len(number, value),
        FieldValue::Float(_) => key_len(number) + FLOAT_LEN,
        FieldValue::Strs(values) => values.iter().map(|value| string_len(number, value)).sum(),
        FieldValue::Uint32s(values) => values.iter().map(|value| uint32_len(number, *value)).sum(),
        FieldValue::Floats(values) => values.len() * (key_len(number) + FLOAT_LEN),
        FieldValue::Absent => 0,
    }
}

fn write_string(number: u32, value: &str, buf: &mut BytesMut) {
    encode_key(number, WireType::LengthDelimited, buf);
    encode_varint(value.len() as u64, buf);
    buf.put_slice(value.as_bytes());
}

fn write_uint32(number: u32, value: u32, buf: &mut BytesMut) {
    encode_key(number, WireType::Varint, buf);
    encode_varint(u64::from(value), buf);
}

fn write_float(number: u32, value: f32, buf: &mut BytesMut) {
    encode_key(number, WireType::ThirtyTwoBit, buf);
    buf.put_f32_le(value);
}

fn write_field(number: u32, value: FieldValue<'_>, buf: &mut BytesMut) {
    match value {
        FieldValue::Str(value) => write_string(number, value, buf),
        FieldValue::Uint32(value) => write_uint32(number, value, buf),
        FieldValue::Float(value) => write_float(number, value, buf),
        FieldValue::Strs(values) => {
            for value in values {
                write_string(number, value, buf);
            }
        },
        FieldValue::Uint32s(values) => {
            for value in values {
                write_uint32(number, *value, buf);
            }
        },
        FieldValue::Floats(values) => {
            for value in values {
                write_float(number, *value, buf);
            }
        },
        FieldValue::Absent => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldId, SchemaVersion};

    fn minimal() -> PinbaMessage {
        PinbaMessage {
            hostname: "h".into(),
            request_count: 1,
            request_time: 1.0,
            ..PinbaMessage::default()
        }
    }

    #[test]
    fn required_fields_lay_out_in_schema_order() -> Result<(), EncodeError> {
        let schema = MessageSchema::default();
        let bytes = ProtobufEncoder::new().encode(&schema, &minimal())?;

        let expected: Vec<u8> = [
            vec![0x0a, 0x01, b'h'], // 1: hostname
            vec![0x12, 0x00],       // 2: server_name
            vec![0x1a, 0x00],       // 3: script_name
            vec![0x20, 0x01],       // 4: request_count
            vec![0x3d, 0x00, 0x00, 0x80, 0x3f], // 7: request_time
            vec![0x45, 0x00, 0x00, 0x00, 0x00], // 8: ru_utime
            vec![0x4d, 0x00, 0x00, 0x00, 0x00], // 9: ru_stime
        ]
        .concat();
        assert_eq!(bytes.as_ref(), expected.as_slice());
        Ok(())
    }

    #[test]
    fn repeated_fields_are_unpacked_and_optionals_skipped() -> Result<(), EncodeError> {
        let message = PinbaMessage {
            dictionary: vec!["ab".into(), "c".into()],
            tag_name: vec![0, 300],
            status: Some(200),
            ..minimal()
        };
        let schema = MessageSchema::default();
        let encoder = ProtobufEncoder::new();
        let bytes = encoder.encode(&schema, &message)?;

        assert_eq!(encoder.encoded_len(&schema, &message)?, bytes.len());
        let dictionary = [0x7a, 0x02, b'a', b'b', 0x7a, 0x01, b'c'];
        assert!(bytes.windows(dictionary.len()).any(|window| window == dictionary));
        // Field 20 needs a two-byte key; 300 needs a two-byte varint.
        let tag_name = [0xa0, 0x01, 0x00, 0xa0, 0x01, 0xac, 0x02];
        assert!(bytes.windows(tag_name.len()).any(|window| window == tag_name));
        let status = [0x80, 0x01, 0xc8, 0x01];
        assert!(bytes.windows(status.len()).any(|window| window == status));
        Ok(())
    }

    #[test]
    fn v1_drops_request_tags_and_schema() -> Result<(), EncodeError> {
        let message = PinbaMessage {
            schema: Some("https".into()),
            tag_name: vec![0],
            tag_value: vec![1],
            dictionary: vec!["k".into(), "v".into()],
            memory_footprint: Some(4096),
            ..minimal()
        };
        let encoder = ProtobufEncoder::new();
        let v1 = encoder.encode(&MessageSchema::for_version(SchemaVersion::V1), &message)?;
        let v2 = encoder.encode(&MessageSchema::for_version(SchemaVersion::V2), &message)?;

        // schema(2+1+5) + tag_name(3) + tag_value(3) + memory_footprint(2+2)
        assert_eq!(v2.len() - v1.len(), 8 + 3 + 3 + 4);
        Ok(())
    }

    #[test]
    fn schema_row_with_wrong_type_is_rejected() {
        static BAD: [FieldSpec; 1] = [FieldSpec {
            number: 1,
            name: "hostname",
            id: FieldId::Hostname,
            ty: FieldType::Uint32,
            cardinality: Cardinality::Required,
        }];
        let schema = MessageSchema::custom(SchemaVersion::V2, &BAD);

        let result = ProtobufEncoder::new().encode(&schema, &minimal());
        assert_eq!(
            result,
            Err(EncodeError::TypeMismatch {
                field: "hostname",
                number: 1,
                reason: "expects a uint32 value",
            })
        );
    }

    #[test]
    fn required_row_over_optional_value_reports_missing() {
        static BAD: [FieldSpec; 1] = [FieldSpec {
            number: 16,
            name: "status",
            id: FieldId::Status,
            ty: FieldType::Uint32,
            cardinality: Cardinality::Required,
        }];
        let schema = MessageSchema::custom(SchemaVersion::V2, &BAD);

        let result = ProtobufEncoder::new().encoded_len(&schema, &minimal());
        assert!(matches!(
            result,
            Err(EncodeError::TypeMismatch {
                reason: "is required but not set",
                ..
            })
        ));
    }

    struct PaddingEncoder;

    impl MessageEncoder for PaddingEncoder {
        fn encoded_len(&self, schema: &MessageSchema, message: &PinbaMessage) -> Result<usize, EncodeError> {
            ProtobufEncoder.encoded_len(schema, message)
        }

        fn encode_raw(
            &self,
            schema: &MessageSchema,
            message: &PinbaMessage,
            buf: &mut BytesMut,
        ) -> Result<(), EncodeError> {
            ProtobufEncoder.encode_raw(schema, message, buf)?;
            buf.put_u8(0);
            Ok(())
        }
    }

    #[test]
    fn length_disagreement_fails_encode() -> Result<(), EncodeError> {
        let schema = MessageSchema::default();
        let expected = ProtobufEncoder.encoded_len(&schema, &minimal())?;

        let result = PaddingEncoder.encode(&schema, &minimal());
        assert_eq!(
            result,
            Err(EncodeError::SizeMismatch {
                expected,
                actual: expected + 1,
            })
        );
        Ok(())
    }
}
