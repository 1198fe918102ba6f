//! Process and host probe boundary contract.

use serde::Serialize;

/// Resource usage of the current process, as far as the probe can tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// User CPU time in seconds.
    pub ru_utime: f64,
    /// System CPU time in seconds.
    pub ru_stime: f64,
    /// Peak resident memory in bytes.
    pub memory_peak: Option<u64>,
    /// Current resident memory in bytes.
    pub memory_footprint: Option<u64>,
}

/// Boundary contract for host and process facts reported with each request.
pub trait SystemProbePort: Send + Sync {
    /// Machine host name, if it can be determined.
    fn hostname(&self) -> Option<String>;

    /// Resource usage snapshot for the current process.
    fn resource_usage(&self) -> ResourceUsage;
}
