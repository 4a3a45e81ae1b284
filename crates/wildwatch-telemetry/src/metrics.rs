//! Pipeline metrics
//!
//! Every `record_*` call updates both the in-process snapshot counters served
//! at `/stats` and the `metrics` facade exported to Prometheus.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const REQUESTS_TOTAL: &str = "wildwatch_requests_total";
pub const THREATS_TOTAL: &str = "wildwatch_threats_total";
pub const NOTIFICATIONS_TOTAL: &str = "wildwatch_notifications_total";
pub const STORE_FAILURES_TOTAL: &str = "wildwatch_store_failures_total";
pub const INFERENCE_LATENCY_US: &str = "wildwatch_inference_latency_us";

/// Metrics collector for pipeline monitoring
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: AtomicU64,
    threats_detected: AtomicU64,
    classifier_errors: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    store_failures: AtomicU64,
    inference_latency_us: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record an analysis request from `source` (image, audio or camera)
    pub fn record_request(&self, source: &'static str) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(REQUESTS_TOTAL, "source" => source).increment(1);
    }

    /// Record a positive verdict
    pub fn record_threat(&self, threat_type: &str) {
        self.inner.threats_detected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(THREATS_TOTAL, "threat_type" => threat_type.to_string()).increment(1);
    }

    /// Record a classifier failure that produced an error detection
    pub fn record_classifier_error(&self) {
        self.inner.classifier_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one dispatch attempt
    pub fn record_notification(&self, sent: bool) {
        let (counter, outcome) = if sent {
            (&self.inner.notifications_sent, "sent")
        } else {
            (&self.inner.notifications_failed, "failed")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(NOTIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
    }

    /// Record a store call that failed or timed out
    pub fn record_store_failure(&self, operation: &'static str) {
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(STORE_FAILURES_TOTAL, "operation" => operation).increment(1);
    }

    /// Record time spent in model inference
    pub fn record_inference_latency(&self, kind: &'static str, latency_us: u64) {
        self.inner
            .inference_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        metrics::histogram!(INFERENCE_LATENCY_US, "kind" => kind).record(latency_us as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            threats_detected: self.inner.threats_detected.load(Ordering::Relaxed),
            classifier_errors: self.inner.classifier_errors.load(Ordering::Relaxed),
            notifications_sent: self.inner.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.inner.notifications_failed.load(Ordering::Relaxed),
            store_failures: self.inner.store_failures.load(Ordering::Relaxed),
            inference_latency_us: self.inner.inference_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub threats_detected: u64,
    pub classifier_errors: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub store_failures: u64,
    pub inference_latency_us: u64,
}

impl MetricsSnapshot {
    /// Calculate average inference latency per request
    pub fn avg_inference_latency_us(&self) -> u64 {
        if self.total_requests == 0 {
            0
        } else {
            self.inference_latency_us / self.total_requests
        }
    }

    /// Fraction of requests that produced a threat verdict
    pub fn threat_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.threats_detected as f64 / self.total_requests as f64
        }
    }
}
