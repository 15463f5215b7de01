use std::{sync::OnceLock, time::Instant};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize process start time.
pub fn init_uptime() {
    START_TIME.get_or_init(Instant::now);
}

/// Get process uptime in seconds.
pub fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

/// Get platform (OS family).
#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

/// Get architecture.
#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

pub fn host_name() -> Option<String> {
    hostname::get().ok()?.into_string().ok()
}

/// Resident memory of this process in megabytes (best effort).
///
/// Read from `VmRSS` in `/proc/self/status`; `0.0` where that is unavailable.
pub fn memory_usage_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/self/status")
            && let Some(kb) = parse_vm_rss_kb(&content)
        {
            return kb as f64 / 1024.0;
        }
    }
    0.0
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform() {
        assert!(!platform().is_empty());
        assert!(!arch().is_empty());
    }

    #[test]
    fn parses_vm_rss() {
        let status = "Name:\tagl\nVmPeak:\t  20000 kB\nVmRSS:\t   10240 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_kb(status), Some(10240));
        assert_eq!(parse_vm_rss_kb("Name:\tagl\n"), None);
    }

    #[test]
    fn memory_is_never_negative() {
        assert!(memory_usage_mb() >= 0.0);
    }

    #[test]
    fn uptime_is_monotonic() {
        init_uptime();
        let a = uptime_seconds();
        let b = uptime_seconds();
        assert!(b >= a);
    }
}
