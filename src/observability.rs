use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Process-wide counters for back-office activity
#[derive(Debug, Default)]
pub struct DeskMetrics {
    pub permission_denials: AtomicU64,
    pub transitions: AtomicU64,
    pub partial_failures: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
}

impl DeskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_denial(&self) {
        self.permission_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial_failure(&self) {
        self.partial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self, delivered: bool) {
        if delivered {
            self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> DeskStats {
        DeskStats {
            permission_denials: self.permission_denials.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            partial_failures: self.partial_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            permission_denials = stats.permission_denials,
            transitions = stats.transitions,
            partial_failures = stats.partial_failures,
            notifications_sent = stats.notifications_sent,
            notifications_failed = stats.notifications_failed,
            "Back-office metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeskStats {
    pub permission_denials: u64,
    pub transitions: u64,
    pub partial_failures: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

/// Global metrics instance
static DESK_METRICS: std::sync::LazyLock<DeskMetrics> = std::sync::LazyLock::new(DeskMetrics::new);

pub fn desk_metrics() -> &'static DeskMetrics {
    &DESK_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
