//! Pinba request message schemas.
//!
//! A schema is an ordered table of field definitions. Encoding walks the
//! table in order, so the table fixes both field numbers and byte layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use Cardinality::{Optional, Repeated, Required};
use FieldType::{Float, Uint32};

/// Revision of the Pinba request message understood by the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Legacy layout, fields 1 to 16.
    V1,
    /// Current layout with memory footprint, schema and request tags.
    #[default]
    V2,
}

impl SchemaVersion {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when a schema version label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown schema version `{0}` (expected v1 or v2)")]
pub struct UnknownSchemaVersion(pub String);

impl FromStr for SchemaVersion {
    type Err = UnknownSchemaVersion;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            _ => Err(UnknownSchemaVersion(input.to_owned())),
        }
    }
}

/// Scalar type of a field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Length-delimited UTF-8.
    String,
    /// Varint.
    Uint32,
    /// Fixed 32-bit little-endian IEEE 754.
    Float,
}

/// Presence rule for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Always emitted.
    Required,
    /// Emitted only when present.
    Optional,
    /// Emitted once per element, unpacked.
    Repeated,
}

/// Logical message field, independent of its number in a given schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Host the request ran on.
    Hostname,
    /// Virtual server name.
    ServerName,
    /// Script or endpoint name.
    ScriptName,
    /// Number of requests described (always 1).
    RequestCount,
    /// Response size in bytes.
    DocumentSize,
    /// Peak memory usage in bytes.
    MemoryPeak,
    /// Wall time of the request in seconds.
    RequestTime,
    /// User CPU time in seconds.
    RuUtime,
    /// System CPU time in seconds.
    RuStime,
    /// Timers per group.
    TimerHitCount,
    /// Summed value per group.
    TimerValue,
    /// Tags per group.
    TimerTagCount,
    /// Group tag name indices.
    TimerTagName,
    /// Group tag value indices.
    TimerTagValue,
    /// Interned strings.
    Dictionary,
    /// Response status.
    Status,
    /// Current memory footprint in bytes.
    MemoryFootprint,
    /// Request scheme, e.g. `http`.
    Schema,
    /// Request tag name indices.
    TagName,
    /// Request tag value indices.
    TagValue,
}

/// One row of a message schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Protobuf field number.
    pub number: u32,
    /// Field name as published by the collector.
    pub name: &'static str,
    /// Logical field.
    pub id: FieldId,
    /// Wire type.
    pub ty: FieldType,
    /// Presence rule.
    pub cardinality: Cardinality,
}

const fn row(
    number: u32,
    name: &'static str,
    id: FieldId,
    ty: FieldType,
    cardinality: Cardinality,
) -> FieldSpec {
    FieldSpec {
        number,
        name,
        id,
        ty,
        cardinality,
    }
}

static V2_FIELDS: [FieldSpec; 20] = [
    row(1, "hostname", FieldId::Hostname, FieldType::String, Required),
    row(2, "server_name", FieldId::ServerName, FieldType::String, Required),
    row(3, "script_name", FieldId::ScriptName, FieldType::String, Required),
    row(4, "request_count", FieldId::RequestCount, Uint32, Required),
    row(5, "document_size", FieldId::DocumentSize, Uint32, Optional),
    row(6, "memory_peak", FieldId::MemoryPeak, Uint32, Optional),
    row(7, "request_time", FieldId::RequestTime, Float, Required),
    row(8, "ru_utime", FieldId::RuUtime, Float, Required),
    row(9, "ru_stime", FieldId::RuStime, Float, Required),
    row(10, "timer_hit_count", FieldId::TimerHitCount, Uint32, Repeated),
    row(11, "timer_value", FieldId::TimerValue, Float, Repeated),
    row(12, "timer_tag_count", FieldId::TimerTagCount, Uint32, Repeated),
    row(13, "timer_tag_name", FieldId::TimerTagName, Uint32, Repeated),
    row(14, "timer_tag_value", FieldId::TimerTagValue, Uint32, Repeated),
    row(15, "dictionary", FieldId::Dictionary, FieldType::String, Repeated),
    row(16, "status", FieldId::Status, Uint32, Optional),
    row(17, "memory_footprint", FieldId::MemoryFootprint, Uint32, Optional),
    row(19, "schema", FieldId::Schema, FieldType::String, Optional),
    row(20, "tag_name", FieldId::TagName, Uint32, Repeated),
    row(21, "tag_value", FieldId::TagValue, Uint32, Repeated),
];

// The legacy layout is the leading prefix of the current one.
const V1_FIELD_COUNT: usize = 16;

/// Ordered field table for one schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSchema {
    version: SchemaVersion,
    fields: &'static [FieldSpec],
}

impl MessageSchema {
    /// Schema table for `version`.
    #[must_use]
    pub fn for_version(version: SchemaVersion) -> Self {
        let fields: &'static [FieldSpec] = match version {
            SchemaVersion::V1 => V2_FIELDS.get(..V1_FIELD_COUNT).unwrap_or(&V2_FIELDS),
            SchemaVersion::V2 => &V2_FIELDS,
        };
        Self { version, fields }
    }

    /// Build a schema from a custom field table.
    ///
    /// Intended for collectors with patched layouts; the encoder still
    /// checks every row against the message value it reads.
    #[must_use]
    pub const fn custom(version: SchemaVersion, fields: &'static [FieldSpec]) -> Self {
        Self { version, fields }
    }

    /// Version this table describes.
    #[must_use]
    pub const fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Rows in emission order.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Row for a logical field, if this version carries it.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.id == id)
    }
}

impl Default for MessageSchema {
    fn default() -> Self {
        Self::for_version(SchemaVersion::default())
    }
}
