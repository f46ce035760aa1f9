//! Process and collaborator health.
//!
//! Combines process CPU, memory and uptime with liveness of the
//! accessibility permission, the overlay render thread and the info cache.

use std::time::Instant;

use serde::Serialize;
use sysinfo::{Pid, System};

/// Process resource usage.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub cpu_usage_percent: f32,
    pub memory_usage_mb: i64,
    pub uptime_seconds: i64,
}

/// Liveness of everything the navigator depends on.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub accessibility: bool,
    pub overlay: bool,
    pub cache_entries: usize,
    pub process: ProcessStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.accessibility
            && self.overlay
            && self.process.cpu_usage_percent < 85.0
            && self.process.memory_usage_mb < 1024
    }

    /// Failing collaborators by name.
    pub fn failing(&self) -> Vec<&'static str> {
        let mut failing = Vec::new();
        if !self.accessibility {
            failing.push("accessibility");
        }
        if !self.overlay {
            failing.push("overlay");
        }
        failing
    }
}

#[derive(Debug)]
pub struct HealthMonitor {
    system: System,
    process_pid: Pid,
    start_time: Instant,
}

impl HealthMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        let process_pid = Pid::from_u32(std::process::id());
        system.refresh_process(process_pid);

        Self {
            system,
            process_pid,
            start_time: Instant::now(),
        }
    }

    pub fn process_status(&mut self) -> ProcessStatus {
        self.system.refresh_process(self.process_pid);

        let (cpu_usage, memory_mb) = self
            .system
            .process(self.process_pid)
            .map(|process| (process.cpu_usage(), process.memory() as i64 / 1024 / 1024))
            .unwrap_or((0.0, 0));

        ProcessStatus {
            cpu_usage_percent: cpu_usage,
            memory_usage_mb: memory_mb,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        }
    }

    pub fn report(&mut self, accessibility: bool, overlay: bool, cache_entries: usize) -> HealthReport {
        HealthReport {
            accessibility,
            overlay,
            cache_entries,
            process: self.process_status(),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_returns_non_negative_values() {
        let mut monitor = HealthMonitor::new();
        let status = monitor.process_status();
        assert!(status.cpu_usage_percent >= 0.0);
        assert!(status.memory_usage_mb >= 0);
        assert!(status.uptime_seconds >= 0);
    }

    #[test]
    fn report_names_failing_collaborators() {
        let mut monitor = HealthMonitor::new();
        let report = monitor.report(false, true, 3);
        assert!(!report.is_healthy());
        assert_eq!(report.failing(), vec!["accessibility"]);
        assert_eq!(report.cache_entries, 3);
    }
}
