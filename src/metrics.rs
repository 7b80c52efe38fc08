//! # Per-process resource metrics from `/proc`.
//!
//! Read-only sampling used by the shell's detailed status view:
//! - resident and peak memory from `/proc/<pid>/status` (`VmRSS`, `VmHWM`)
//! - open descriptor count from `/proc/<pid>/fd`
//! - average CPU share from `/proc/<pid>/stat` (utime+stime over uptime)
//!
//! Sampling a pid that is gone (or not ours to inspect) yields zeroed
//! metrics; status rendering must never fail because a child raced away.

use std::fs;
use std::time::Duration;

use nix::sys::signal::kill;
use nix::unistd::{sysconf, Pid, SysconfVar};

/// One sample of a child's resource usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMetrics {
    /// Average CPU share since spawn, in percent.
    pub cpu_percent: f64,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    /// Peak resident set size in bytes.
    pub memory_peak_bytes: u64,
    /// Number of open file descriptors.
    pub file_descriptors: usize,
}

/// Stateless `/proc` reader.
pub struct MetricsCollector;

impl MetricsCollector {
    /// Samples the given pid. `uptime` is the instance's uptime, used for
    /// the average-CPU calculation.
    pub fn collect(pid: i32, uptime: Duration) -> ProcessMetrics {
        if pid <= 0 || kill(Pid::from_raw(pid), None).is_err() {
            return ProcessMetrics::default();
        }

        ProcessMetrics {
            cpu_percent: Self::cpu_percent(pid, uptime),
            memory_bytes: Self::status_kb(pid, "VmRSS:").unwrap_or(0) * 1024,
            memory_peak_bytes: Self::status_kb(pid, "VmHWM:").unwrap_or(0) * 1024,
            file_descriptors: Self::count_fds(pid),
        }
    }

    /// Reads a kB-valued field out of `/proc/<pid>/status`.
    fn status_kb(pid: i32, key: &str) -> Option<u64> {
        let text = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix(key) {
                return rest.split_whitespace().next()?.parse().ok();
            }
        }
        None
    }

    fn count_fds(pid: i32) -> usize {
        fs::read_dir(format!("/proc/{pid}/fd"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Average CPU share since spawn: (utime + stime) / CLK_TCK / uptime.
    fn cpu_percent(pid: i32, uptime: Duration) -> f64 {
        let secs = uptime.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        let Ok(text) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
            return 0.0;
        };
        // Fields after the parenthesized comm: state is index 0, utime 11,
        // stime 12.
        let Some(after_comm) = text.rsplit_once(')').map(|(_, rest)| rest) else {
            return 0.0;
        };
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        let (Some(utime), Some(stime)) = (
            fields.get(11).and_then(|v| v.parse::<u64>().ok()),
            fields.get(12).and_then(|v| v.parse::<u64>().ok()),
        ) else {
            return 0.0;
        };
        let ticks_per_sec = sysconf(SysconfVar::CLK_TCK)
            .ok()
            .flatten()
            .unwrap_or(100) as f64;
        ((utime + stime) as f64 / ticks_per_sec) / secs * 100.0
    }

    /// Formats a byte count as `B` / `KB` / `MB` / `GB` with one decimal.
    pub fn format_bytes(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;
        const GB: u64 = 1024 * MB;
        if bytes >= GB {
            format!("{:.1}GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1}MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1}KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes}B")
        }
    }

    /// Formats an uptime as `3s`, `2m3s`, or `1h2m3s`.
    pub fn format_uptime(uptime: Duration) -> String {
        let total = uptime.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if hours > 0 {
            format!("{hours}h{minutes}m{seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m{seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_picks_the_unit() {
        assert_eq!(MetricsCollector::format_bytes(512), "512B");
        assert_eq!(MetricsCollector::format_bytes(2048), "2.0KB");
        assert_eq!(MetricsCollector::format_bytes(3 * 1024 * 1024), "3.0MB");
        assert_eq!(
            MetricsCollector::format_bytes(5 * 1024 * 1024 * 1024),
            "5.0GB"
        );
    }

    #[test]
    fn format_uptime_omits_leading_zero_units() {
        assert_eq!(MetricsCollector::format_uptime(Duration::from_secs(3)), "3s");
        assert_eq!(
            MetricsCollector::format_uptime(Duration::from_secs(123)),
            "2m3s"
        );
        assert_eq!(
            MetricsCollector::format_uptime(Duration::from_secs(3723)),
            "1h2m3s"
        );
    }

    #[test]
    fn collect_reads_own_process() {
        let pid = std::process::id() as i32;
        let metrics = MetricsCollector::collect(pid, Duration::from_secs(1));
        assert!(metrics.memory_bytes > 0);
        assert!(metrics.file_descriptors > 0);
    }

    #[test]
    fn collect_zeroes_for_dead_pid() {
        let metrics = MetricsCollector::collect(-1, Duration::from_secs(1));
        assert_eq!(metrics.memory_bytes, 0);
        assert_eq!(metrics.file_descriptors, 0);
    }
}
