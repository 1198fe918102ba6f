//! Host and process probe.
//!
//! CPU times and peak resident memory come from `getrusage(RUSAGE_SELF)`;
//! the host name and current resident memory come from `sysinfo`.

use pinba_ports::{ResourceUsage, SystemProbePort};
use std::sync::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Reads the host name and resource usage of the current process.
#[derive(Debug)]
pub struct SysinfoProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl SysinfoProbe {
    /// Create a probe for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            system: Mutex::new(System::new()),
        }
    }

    fn current_memory(&self) -> Option<u64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        system.process(self.pid).map(sysinfo::Process::memory)
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbePort for SysinfoProbe {
    fn hostname(&self) -> Option<String> {
        System::host_name().filter(|name| !name.trim().is_empty())
    }

    fn resource_usage(&self) -> ResourceUsage {
        let footprint = self.current_memory();
        if footprint.is_none() {
            tracing::debug!(pid = %self.pid, "process memory unavailable");
        }
        let Some(usage) = rusage::current() else {
            tracing::debug!("getrusage unavailable");
            return ResourceUsage {
                memory_peak: footprint,
                memory_footprint: footprint,
                ..ResourceUsage::default()
            };
        };

        // RSS is sampled after getrusage, so it can briefly exceed the peak.
        let memory_peak = match (usage.max_rss, footprint) {
            (Some(peak), Some(current)) => Some(peak.max(current)),
            (peak, current) => peak.or(current),
        };

        ResourceUsage {
            ru_utime: usage.user_seconds,
            ru_stime: usage.system_seconds,
            memory_peak,
            memory_footprint: footprint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RusageSnapshot {
    user_seconds: f64,
    system_seconds: f64,
    max_rss: Option<u64>,
}

#[cfg(unix)]
mod rusage {
    use super::RusageSnapshot;
    use std::mem::MaybeUninit;

    // Linux and the BSDs report ru_maxrss in KiB, macOS in bytes.
    #[cfg(target_os = "macos")]
    const MAX_RSS_UNIT: u64 = 1;
    #[cfg(not(target_os = "macos"))]
    const MAX_RSS_UNIT: u64 = 1024;

    #[allow(unsafe_code, reason = "getrusage fills a caller-owned rusage struct")]
    pub(super) fn current() -> Option<RusageSnapshot> {
        let mut raw = MaybeUninit::<libc::rusage>::zeroed();
        let status = unsafe { libc::getrusage(libc::RUSAGE_SELF, raw.as_mut_ptr()) };
        if status != 0 {
            return None;
        }
        let raw = unsafe { raw.assume_init() };

        Some(RusageSnapshot {
            user_seconds: timeval_seconds(raw.ru_utime),
            system_seconds: timeval_seconds(raw.ru_stime),
            max_rss: u64::try_from(raw.ru_maxrss)
                .ok()
                .filter(|rss| *rss > 0)
                .map(|rss| rss.saturating_mul(MAX_RSS_UNIT)),
        })
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "process CPU seconds stay far below f64 precision limits"
    )]
    fn timeval_seconds(time: libc::timeval) -> f64 {
        time.tv_sec as f64 + time.tv_usec as f64 / 1_000_000.0
    }
}

#[cfg(not(unix))]
mod rusage {
    use super::RusageSnapshot;

    pub(super) const fn current() -> Option<RusageSnapshot> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;
    use std::time::{Duration, Instant};

    fn burn_cpu(for_at_least: Duration) -> u64 {
        let start = Instant::now();
        let mut acc = 0u64;
        while start.elapsed() < for_at_least {
            for step in 0..10_000u64 {
                acc = black_box(acc.wrapping_mul(31).wrapping_add(step));
            }
        }
        acc
    }

    #[cfg(unix)]
    #[test]
    fn cpu_time_grows_with_work() {
        let probe = SysinfoProbe::new();
        black_box(burn_cpu(Duration::from_millis(300)));
        let usage = probe.resource_usage();

        assert!(usage.ru_utime > 0.0, "user CPU time stayed at zero: {usage:?}");
        assert!(usage.ru_stime >= 0.0);

        black_box(burn_cpu(Duration::from_millis(50)));
        let later = probe.resource_usage();
        assert!(later.ru_utime >= usage.ru_utime);
    }

    #[cfg(unix)]
    #[test]
    fn peak_survives_freed_allocations_across_probes() {
        let mut block = vec![0u8; 64 << 20];
        for page in block.chunks_mut(4096) {
            if let Some(byte) = page.first_mut() {
                *byte = 1;
            }
        }
        black_box(&block);
        drop(block);

        // A fresh probe still sees the high-water mark.
        let after = SysinfoProbe::new().resource_usage();
        let peak = after.memory_peak.unwrap_or(0);
        assert!(peak >= 64 << 20, "peak {peak} did not cover a 64 MiB block");
        if let Some(footprint) = after.memory_footprint {
            assert!(peak >= footprint);
        }
    }

    #[test]
    fn hostname_is_never_blank() {
        let probe = SysinfoProbe::default();
        if let Some(hostname) = probe.hostname() {
            assert!(!hostname.trim().is_empty());
        }
    }
}
