//! Process resource sampling around each render pass.
//!
//! Advisory only: the numbers are logged for capacity planning and never
//! feed admission decisions. CPU time is process-wide, so concurrent
//! renders show up in each other's figures.

use std::time::{Duration, Instant};
use tracing::info;

/// A point-in-time reading of this process's resource use.
#[derive(Debug, Clone, Copy)]
pub struct UsageSample {
    taken_at: Instant,
    /// Resident set size, when the platform exposes it.
    pub rss_bytes: Option<u64>,
    /// User + system CPU time consumed by the process so far.
    pub cpu_time: Option<Duration>,
}

impl UsageSample {
    pub fn now() -> Self {
        Self {
            taken_at: Instant::now(),
            rss_bytes: memory_stats::memory_stats().map(|m| m.physical_mem as u64),
            cpu_time: process_cpu_time(),
        }
    }

    pub fn rss_mib(&self) -> Option<f64> {
        self.rss_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }

    /// CPU utilisation between `earlier` and `self`, in percent of one core.
    pub fn cpu_percent_since(&self, earlier: &UsageSample) -> Option<f64> {
        let wall = self.taken_at.checked_duration_since(earlier.taken_at)?;
        let busy = self.cpu_time?.checked_sub(earlier.cpu_time?)?;
        if wall.is_zero() {
            return None;
        }
        Some(busy.as_secs_f64() / wall.as_secs_f64() * 100.0)
    }
}

/// Log a sample under `stage`, with CPU % relative to `since` if given.
pub fn log_usage(stage: &str, sample: &UsageSample, since: Option<&UsageSample>) {
    let rss = sample
        .rss_mib()
        .map(|mb| format!("{mb:.2} MB"))
        .unwrap_or_else(|| "n/a".into());
    let cpu = since
        .and_then(|earlier| sample.cpu_percent_since(earlier))
        .map(|pct| format!("{pct:.1}%"))
        .unwrap_or_else(|| "n/a".into());
    info!("{} - Memory Usage: {}, CPU Usage: {}", stage, rss, cpu);
}

#[cfg(unix)]
fn process_cpu_time() -> Option<Duration> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: getrusage only writes into the struct we hand it.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the kernel filled the struct.
    let usage = unsafe { usage.assume_init() };
    let to_duration = |tv: libc::timeval| {
        Duration::from_secs(tv.tv_sec.max(0) as u64)
            + Duration::from_micros(tv.tv_usec.max(0) as u64)
    };
    Some(to_duration(usage.ru_utime) + to_duration(usage.ru_stime))
}

#[cfg(not(unix))]
fn process_cpu_time() -> Option<Duration> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_percent_requires_elapsed_wall_time() {
        let a = UsageSample {
            taken_at: Instant::now(),
            rss_bytes: None,
            cpu_time: Some(Duration::from_millis(10)),
        };
        assert_eq!(a.cpu_percent_since(&a), None);
    }

    #[test]
    fn cpu_percent_from_synthetic_samples() {
        let start = Instant::now();
        let earlier = UsageSample {
            taken_at: start,
            rss_bytes: Some(1024 * 1024),
            cpu_time: Some(Duration::from_millis(100)),
        };
        let later = UsageSample {
            taken_at: start + Duration::from_secs(1),
            rss_bytes: Some(2 * 1024 * 1024),
            cpu_time: Some(Duration::from_millis(600)),
        };
        let pct = later.cpu_percent_since(&earlier).unwrap();
        assert!((pct - 50.0).abs() < 1e-6, "got {pct}");
        assert_eq!(later.rss_mib(), Some(2.0));
    }

    #[cfg(unix)]
    #[test]
    fn live_sample_reports_cpu_time() {
        assert!(UsageSample::now().cpu_time.is_some());
    }
}
