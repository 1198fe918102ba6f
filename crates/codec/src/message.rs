//! Wire-ready Pinba request message.

use crate::schema::FieldId;
use pinba_domain::AggregatedSummary;
use serde::{Deserialize, Serialize};

/// Request-level fields that do not come from aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Host the request ran on.
    pub hostname: String,
    /// Virtual server name.
    pub server_name: String,
    /// Script or endpoint name.
    pub script_name: String,
    /// Request scheme; omitted from the wire when `None`.
    pub schema: Option<String>,
    /// Wall time of the request in seconds.
    pub request_time: f32,
    /// User CPU time in seconds.
    pub ru_utime: f32,
    /// System CPU time in seconds.
    pub ru_stime: f32,
    /// Response size in bytes.
    pub document_size: Option<u32>,
    /// Peak memory usage in bytes.
    pub memory_peak: Option<u32>,
    /// Current memory footprint in bytes.
    pub memory_footprint: Option<u32>,
    /// Response status.
    pub status: Option<u32>,
}

/// Per-flush replacements for header fields. Unset fields keep the header value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessageOverrides {
    /// Replacement host name.
    pub hostname: Option<String>,
    /// Replacement server name.
    pub server_name: Option<String>,
    /// Replacement script name.
    pub script_name: Option<String>,
    /// Replacement request scheme.
    pub schema: Option<String>,
    /// Replacement wall time in seconds.
    pub request_time: Option<f32>,
    /// Replacement user CPU time in seconds.
    pub ru_utime: Option<f32>,
    /// Replacement system CPU time in seconds.
    pub ru_stime: Option<f32>,
    /// Replacement response size.
    pub document_size: Option<u32>,
    /// Replacement peak memory usage.
    pub memory_peak: Option<u32>,
    /// Replacement memory footprint.
    pub memory_footprint: Option<u32>,
    /// Replacement response status.
    pub status: Option<u32>,
}

impl MessageOverrides {
    /// Returns true when no field is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write every set override into `header`.
    pub fn apply(&self, header: &mut MessageHeader) {
        if let Some(hostname) = &self.hostname {
            header.hostname.clone_from(hostname);
        }
        if let Some(server_name) = &self.server_name {
            header.server_name.clone_from(server_name);
        }
        if let Some(script_name) = &self.script_name {
            header.script_name.clone_from(script_name);
        }
        if let Some(schema) = &self.schema {
            header.schema = Some(schema.clone());
        }
        if let Some(request_time) = self.request_time {
            header.request_time = request_time;
        }
        if let Some(ru_utime) = self.ru_utime {
            header.ru_utime = ru_utime;
        }
        if let Some(ru_stime) = self.ru_stime {
            header.ru_stime = ru_stime;
        }
        header.document_size = self.document_size.or(header.document_size);
        header.memory_peak = self.memory_peak.or(header.memory_peak);
        header.memory_footprint = self.memory_footprint.or(header.memory_footprint);
        header.status = self.status.or(header.status);
    }
}

/// One Pinba request record, field for field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PinbaMessage {
    /// Field 1.
    pub hostname: String,
    /// Field 2.
    pub server_name: String,
    /// Field 3.
    pub script_name: String,
    /// Field 4.
    pub request_count: u32,
    /// Field 5.
    pub document_size: Option<u32>,
    /// Field 6.
    pub memory_peak: Option<u32>,
    /// Field 7.
    pub request_time: f32,
    /// Field 8.
    pub ru_utime: f32,
    /// Field 9.
    pub ru_stime: f32,
    /// Field 10.
    pub timer_hit_count: Vec<u32>,
    /// Field 11.
    pub timer_value: Vec<f32>,
    /// Field 12.
    pub timer_tag_count: Vec<u32>,
    /// Field 13.
    pub timer_tag_name: Vec<u32>,
    /// Field 14.
    pub timer_tag_value: Vec<u32>,
    /// Field 15.
    pub dictionary: Vec<String>,
    /// Field 16.
    pub status: Option<u32>,
    /// Field 17.
    pub memory_footprint: Option<u32>,
    /// Field 19.
    pub schema: Option<String>,
    /// Field 20.
    pub tag_name: Vec<u32>,
    /// Field 21.
    pub tag_value: Vec<u32>,
}

/// Borrowed value of one message field, tagged with its shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Single string.
    Str(&'a str),
    /// Single varint.
    Uint32(u32),
    /// Single float.
    Float(f32),
    /// Repeated strings.
    Strs(&'a [String]),
    /// Repeated varints.
    Uint32s(&'a [u32]),
    /// Repeated floats.
    Floats(&'a [f32]),
    /// Optional field that is not set.
    Absent,
}

impl PinbaMessage {
    /// Lay out an aggregated summary under `header`.
    #[must_use]
    pub fn from_summary(header: MessageHeader, summary: AggregatedSummary) -> Self {
        Self {
            hostname: header.hostname,
            server_name: header.server_name,
            script_name: header.script_name,
            request_count: 1,
            document_size: header.document_size,
            memory_peak: header.memory_peak,
            request_time: header.request_time,
            ru_utime: header.ru_utime,
            ru_stime: header.ru_stime,
            timer_hit_count: summary.timer_hit_count,
            timer_value: summary.timer_value.into_iter().map(seconds_f32).collect(),
            timer_tag_count: summary.timer_tag_count,
            timer_tag_name: summary.timer_tag_name,
            timer_tag_value: summary.timer_tag_value,
            dictionary: summary.dictionary,
            status: header.status,
            memory_footprint: header.memory_footprint,
            schema: header.schema,
            tag_name: summary.tag_name,
            tag_value: summary.tag_value,
        }
    }

    /// Current value of a logical field.
    #[must_use]
    pub fn field_value(&self, id: FieldId) -> FieldValue<'_> {
        match id {
            FieldId::Hostname => FieldValue::Str(&self.hostname),
            FieldId::ServerName => FieldValue::Str(&self.server_name),
            FieldId::ScriptName => FieldValue::Str(&self.script_name),
            FieldId::RequestCount => FieldValue::Uint32(self.request_count),
            FieldId::DocumentSize => optional_u32(self.document_size),
            FieldId::MemoryPeak => optional_u32(self.memory_peak),
            FieldId::RequestTime => FieldValue::Float(self.request_time),
            FieldId::RuUtime => FieldValue::Float(self.ru_utime),
            FieldId::RuStime => FieldValue::Float(self.ru_stime),
            FieldId::TimerHitCount => FieldValue::Uint32s(&self.timer_hit_count),
            FieldId::TimerValue => FieldValue::Floats(&self.timer_value),
            FieldId::TimerTagCount => FieldValue::Uint32s(&self.timer_tag_count),
            FieldId::TimerTagName => FieldValue::Uint32s(&self.timer_tag_name),
            FieldId::TimerTagValue => FieldValue::Uint32s(&self.timer_tag_value),
            FieldId::Dictionary => FieldValue::Strs(&self.dictionary),
            FieldId::Status => optional_u32(self.status),
            FieldId::MemoryFootprint => optional_u32(self.memory_footprint),
            FieldId::Schema => self
                .schema
                .as_deref()
                .map_or(FieldValue::Absent, FieldValue::Str),
            FieldId::TagName => FieldValue::Uint32s(&self.tag_name),
            FieldId::TagValue => FieldValue::Uint32s(&self.tag_value),
        }
    }
}

/// Narrow seconds to the wire's 32-bit float.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "pinba carries timings as 32-bit floats"
)]
pub fn seconds_f32(seconds: f64) -> f32 {
    seconds as f32
}

/// Saturating conversion of a byte count to the wire's 32-bit varint.
#[must_use]
pub fn bytes_u32(bytes: u64) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

const fn optional_u32(value: Option<u32>) -> FieldValue<'static> {
    match value {
        Some(value) => FieldValue::Uint32(value),
        None => FieldValue::Absent,
    }
}
