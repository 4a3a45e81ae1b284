//! Wildwatch Telemetry
//!
//! Audit and metrics for the detection pipeline.
//!
//! Provides:
//! - Hash-chained audit log of alert events, optionally mirrored to JSONL
//! - Pipeline counters for `/stats` and Prometheus

pub mod audit;
pub mod metrics;
pub mod persistence;

pub use audit::{
    AuditEvent, AuditLog, AuditSeverity, AuditTrail, ALERT_FAILED, ALERT_SENT, ALERT_SIMULATED,
};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use persistence::{read_events, AuditSink};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditLog, AuditTrail};
    pub use crate::metrics::MetricsCollector;
}
