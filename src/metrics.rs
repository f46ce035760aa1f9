//! Per-flow counters and timing for the navigator.
//!
//! Counters are lock-free atomics so any thread may record into them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use uuid::Uuid;

/// Timing for a single flow invocation.
#[derive(Debug)]
pub struct FlowTimer {
    /// Unique identifier, attached to the flow's log lines.
    pub flow_id: String,
    pub flow: &'static str,
    start_time: Instant,
}

impl FlowTimer {
    pub fn start(flow: &'static str) -> Self {
        Self {
            flow_id: Uuid::new_v4().to_string(),
            flow,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}

/// Counters for one flow.
#[derive(Debug, Default)]
pub struct FlowCounters {
    total: AtomicU64,
    failed: AtomicU64,
    total_time_us: AtomicU64,
}

impl FlowCounters {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.total_time_us.load(Ordering::Relaxed) as f64 / total as f64 / 1000.0
    }
}

/// Snapshot row for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSummary {
    pub flow: &'static str,
    pub total: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
}

/// Aggregated metrics keyed by flow name.
#[derive(Clone, Debug, Default)]
pub struct FlowMetrics {
    flows: Arc<RwLock<BTreeMap<&'static str, Arc<FlowCounters>>>>,
}

impl FlowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, flow: &'static str) -> Arc<FlowCounters> {
        if let Ok(flows) = self.flows.read() {
            if let Some(c) = flows.get(flow) {
                return c.clone();
            }
        }
        match self.flows.write() {
            Ok(mut flows) => flows.entry(flow).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(flow).or_default().clone(),
        }
    }

    pub fn record_success(&self, timer: &FlowTimer) {
        let c = self.counters(timer.flow);
        c.total.fetch_add(1, Ordering::Relaxed);
        c.total_time_us.fetch_add(timer.elapsed_us(), Ordering::Relaxed);
    }

    pub fn record_failure(&self, timer: &FlowTimer) {
        let c = self.counters(timer.flow);
        c.total.fetch_add(1, Ordering::Relaxed);
        c.failed.fetch_add(1, Ordering::Relaxed);
        c.total_time_us.fetch_add(timer.elapsed_us(), Ordering::Relaxed);
    }

    pub fn record<T, E>(&self, timer: &FlowTimer, result: &Result<T, E>) {
        match result {
            Ok(_) => self.record_success(timer),
            Err(_) => self.record_failure(timer),
        }
    }

    pub fn flow(&self, flow: &'static str) -> Option<Arc<FlowCounters>> {
        self.flows.read().ok().and_then(|f| f.get(flow).cloned())
    }

    pub fn summary(&self) -> Vec<FlowSummary> {
        let Ok(flows) = self.flows.read() else {
            return Vec::new();
        };
        flows
            .iter()
            .map(|(flow, c)| FlowSummary {
                flow: *flow,
                total: c.total(),
                failed: c.failed(),
                avg_duration_ms: c.avg_duration_ms(),
            })
            .collect()
    }
}
