//! Per-request state: metadata, request tags and the timer store.

use bytes::Bytes;
use pinba_adapters::{SysinfoProbe, SystemClock, UdpTransport};
use pinba_codec::{
    FieldId, MessageEncoder, MessageHeader, MessageOverrides, MessageSchema, PinbaMessage,
    ProtobufEncoder, SchemaVersion, bytes_u32, seconds_f32,
};
use pinba_config::ValidatedPinbaConfig;
use pinba_domain::{TagMap, TimerData, TimerHandle, TimerInfo, TimerStore, aggregate};
use pinba_ports::{ClockPort, DatagramTransport, PinbaEndpoint, SystemProbePort};
use pinba_shared::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Host name reported when neither config nor probe provide one.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// Ports a request talks to.
#[derive(Clone)]
pub struct RequestDeps {
    /// Datagram sender used by flush.
    pub transport: Arc<dyn DatagramTransport>,
    /// Source of timer and request instants.
    pub clock: Arc<dyn ClockPort>,
    /// Host name and resource usage.
    pub system: Arc<dyn SystemProbePort>,
    /// Wire encoder.
    pub encoder: Arc<dyn MessageEncoder>,
}

impl RequestDeps {
    /// Production wiring: tokio UDP, system clock, sysinfo probe, protobuf encoder.
    #[must_use]
    pub fn system_defaults() -> Self {
        Self {
            transport: Arc::new(UdpTransport::new()),
            clock: Arc::new(SystemClock),
            system: Arc::new(SysinfoProbe::new()),
            encoder: Arc::new(ProtobufEncoder::new()),
        }
    }
}

impl fmt::Debug for RequestDeps {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("RequestDeps").finish_non_exhaustive()
    }
}

/// Serializable snapshot of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestInfo {
    /// Host name.
    pub hostname: String,
    /// Virtual server name.
    pub server_name: String,
    /// Script name.
    pub script_name: String,
    /// Request scheme.
    pub schema: String,
    /// Always 1.
    pub req_count: u32,
    /// Every timer, running ones peeked.
    pub timers: Vec<TimerInfo>,
    /// Request tags.
    pub tags: TagMap,
    /// Seconds since the request started.
    pub req_time: f64,
    /// User CPU time in seconds.
    pub ru_utime: f64,
    /// System CPU time in seconds.
    pub ru_stime: f64,
    /// Peak memory usage in bytes.
    pub mem_peak_usage: Option<u64>,
    /// Response size in bytes.
    pub doc_size: Option<u32>,
}

/// One logical request being measured.
///
/// Owns its timers and request tags. Mutation takes `&mut self`; a request
/// is meant to live on the task that serves it.
pub struct Request {
    pub(crate) hostname: String,
    pub(crate) server_name: String,
    pub(crate) script_name: String,
    pub(crate) schema: String,
    pub(crate) pinba_server: String,
    pub(crate) pinba_port: u16,
    pub(crate) document_size: Option<u32>,
    pub(crate) status: Option<u32>,
    pub(crate) tags: TagMap,
    pub(crate) started_at: Instant,
    pub(crate) timers: TimerStore,
    pub(crate) message_schema: MessageSchema,
    pub(crate) deps: RequestDeps,
}

impl Request {
    /// Build a request from validated config and explicit ports.
    #[must_use]
    pub fn new(config: ValidatedPinbaConfig, deps: RequestDeps) -> Self {
        let config = config.into_inner();
        let hostname = config
            .hostname
            .or_else(|| deps.system.hostname())
            .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_owned());
        let started_at = deps.clock.now();

        Self {
            hostname,
            server_name: config.server_name,
            script_name: config.script_name,
            schema: config.schema,
            pinba_server: config.pinba_server,
            pinba_port: config.pinba_port,
            document_size: None,
            status: None,
            tags: TagMap::new(),
            started_at,
            timers: TimerStore::new(),
            message_schema: MessageSchema::for_version(config.schema_version),
            deps,
        }
    }

    /// Build a request wired to the production adapters.
    #[must_use]
    pub fn from_config(config: ValidatedPinbaConfig) -> Self {
        Self::new(config, RequestDeps::system_defaults())
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Host name reported with the request.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Set the host name.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = hostname.into();
    }

    /// Virtual server name.
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Set the virtual server name.
    pub fn set_server_name(&mut self, server_name: impl Into<String>) {
        self.server_name = server_name.into();
    }

    /// Script name.
    #[must_use]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Set the script name.
    pub fn set_script_name(&mut self, script_name: impl Into<String>) {
        self.script_name = script_name.into();
    }

    /// Request scheme; empty when not reported.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Set the request scheme.
    pub fn set_schema(&mut self, schema: impl Into<String>) {
        self.schema = schema.into();
    }

    /// Collector host.
    #[must_use]
    pub fn pinba_server(&self) -> &str {
        &self.pinba_server
    }

    /// Set the collector host.
    pub fn set_pinba_server(&mut self, pinba_server: impl Into<String>) {
        self.pinba_server = pinba_server.into();
    }

    /// Collector port.
    #[must_use]
    pub const fn pinba_port(&self) -> u16 {
        self.pinba_port
    }

    /// Set the collector port.
    pub const fn set_pinba_port(&mut self, pinba_port: u16) {
        self.pinba_port = pinba_port;
    }

    /// Response size, if set.
    #[must_use]
    pub const fn document_size(&self) -> Option<u32> {
        self.document_size
    }

    /// Set the response size reported with the request.
    pub const fn set_document_size(&mut self, document_size: Option<u32>) {
        self.document_size = document_size;
    }

    /// Response status, if set.
    #[must_use]
    pub const fn status(&self) -> Option<u32> {
        self.status
    }

    /// Set the response status reported with the request.
    pub const fn set_status(&mut self, status: Option<u32>) {
        self.status = status;
    }

    /// Message layout used when encoding.
    #[must_use]
    pub const fn schema_version(&self) -> SchemaVersion {
        self.message_schema.version()
    }

    /// Collector address.
    #[must_use]
    pub fn endpoint(&self) -> PinbaEndpoint {
        PinbaEndpoint::new(self.pinba_server.as_str(), self.pinba_port)
    }

    // -------------------------------------------------------------------------
    // Request tags
    // -------------------------------------------------------------------------

    /// Set a request tag, replacing any previous value.
    pub fn tag_set(&mut self, name: impl Into<Box<str>>, value: impl Into<Box<str>>) {
        self.tags.insert(name, value);
    }

    /// Request tag value.
    #[must_use]
    pub fn tag_get(&self, name: &str) -> Option<&str> {
        self.tags.get(name)
    }

    /// Remove a request tag. Returns true if it existed.
    pub fn tag_delete(&mut self, name: &str) -> bool {
        self.tags.remove(name).is_some()
    }

    /// All request tags.
    #[must_use]
    pub const fn tags_get(&self) -> &TagMap {
        &self.tags
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Start a running timer.
    pub fn timer_start(&mut self, tags: TagMap, data: TimerData) -> TimerHandle {
        let now = self.deps.clock.now();
        self.timers.start(tags, data, now)
    }

    /// Record a pre-measured duration in seconds.
    pub fn timer_add(&mut self, tags: TagMap, value: f64, data: TimerData) -> Result<TimerHandle> {
        Ok(self.timers.add(tags, value, data)?)
    }

    /// Stop a running timer.
    pub fn timer_stop(&mut self, handle: TimerHandle) -> Result<()> {
        let now = self.deps.clock.now();
        Ok(self.timers.stop(handle, now)?)
    }

    /// Delete a timer.
    pub fn timer_delete(&mut self, handle: TimerHandle) -> Result<()> {
        Ok(self.timers.delete(handle)?)
    }

    /// Merge tags into a timer.
    pub fn timer_tags_merge(&mut self, handle: TimerHandle, tags: TagMap) -> Result<()> {
        Ok(self.timers.merge_tags(handle, tags)?)
    }

    /// Replace a timer's tags.
    pub fn timer_tags_replace(&mut self, handle: TimerHandle, tags: TagMap) -> Result<()> {
        Ok(self.timers.replace_tags(handle, tags)?)
    }

    /// Merge data into a timer.
    pub fn timer_data_merge(&mut self, handle: TimerHandle, data: TimerData) -> Result<()> {
        Ok(self.timers.merge_data(handle, data)?)
    }

    /// Replace a timer's data.
    pub fn timer_data_replace(&mut self, handle: TimerHandle, data: TimerData) -> Result<()> {
        Ok(self.timers.replace_data(handle, data)?)
    }

    /// Snapshot a timer without stopping it.
    pub fn timer_get_info(&self, handle: TimerHandle) -> Result<TimerInfo> {
        let now = self.deps.clock.now();
        Ok(self.timers.info(handle, now)?)
    }

    /// Stop every running timer. Returns how many were stopped.
    pub fn timers_stop(&mut self) -> usize {
        let now = self.deps.clock.now();
        self.timers.stop_all(now)
    }

    /// Timer handles in creation order.
    #[must_use]
    pub fn timer_handles(&self, only_stopped: bool) -> Vec<TimerHandle> {
        self.timers.handles(only_stopped)
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Snapshot of the whole request.
    #[must_use]
    pub fn get_info(&self) -> RequestInfo {
        let now = self.deps.clock.now();
        let usage = self.deps.system.resource_usage();

        RequestInfo {
            hostname: self.hostname.clone(),
            server_name: self.server_name.clone(),
            script_name: self.script_name.clone(),
            schema: self.schema.clone(),
            req_count: 1,
            timers: self.timers.infos(now),
            tags: self.tags.clone(),
            req_time: now.saturating_duration_since(self.started_at).as_secs_f64(),
            ru_utime: usage.ru_utime,
            ru_stime: usage.ru_stime,
            mem_peak_usage: usage.memory_peak,
            doc_size: self.document_size,
        }
    }

    /// The message a flush would encode right now. Running timers are not
    /// included and nothing is stopped or cleared.
    #[must_use]
    pub fn message_data(&self, overrides: &MessageOverrides) -> PinbaMessage {
        let now = self.deps.clock.now();
        self.build_message(now, overrides)
    }

    /// Encode [`Request::message_data`] without sending it.
    pub fn encode(&self, overrides: &MessageOverrides) -> Result<Bytes> {
        let message = self.message_data(overrides);
        Ok(self.deps.encoder.encode(&self.message_schema, &message)?)
    }

    pub(crate) fn build_message(&self, now: Instant, overrides: &MessageOverrides) -> PinbaMessage {
        let mut header = self.header(now);
        overrides.apply(&mut header);
        // Layouts without request tag fields must not intern them either.
        let untagged = TagMap::new();
        let request_tags = if self.message_schema.field(FieldId::TagName).is_some() {
            &self.tags
        } else {
            &untagged
        };
        let summary = aggregate(request_tags, self.timers.timers(true));
        PinbaMessage::from_summary(header, summary)
    }

    fn header(&self, now: Instant) -> MessageHeader {
        let usage = self.deps.system.resource_usage();
        let request_time = now.saturating_duration_since(self.started_at).as_secs_f64();

        MessageHeader {
            hostname: self.hostname.clone(),
            server_name: self.server_name.clone(),
            script_name: self.script_name.clone(),
            schema: (!self.schema.is_empty()).then(|| self.schema.clone()),
            request_time: seconds_f32(request_time),
            ru_utime: seconds_f32(usage.ru_utime),
            ru_stime: seconds_f32(usage.ru_stime),
            document_size: self.document_size,
            memory_peak: usage.memory_peak.map(bytes_u32),
            memory_footprint: usage.memory_footprint.map(bytes_u32),
            status: self.status,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Request")
            .field("hostname", &self.hostname)
            .field("server_name", &self.server_name)
            .field("script_name", &self.script_name)
            .field("endpoint", &self.endpoint())
            .field("tags", &self.tags)
            .field("timers", &self.timers.len())
            .field("schema_version", &self.schema_version())
            .finish_non_exhaustive()
    }
}
