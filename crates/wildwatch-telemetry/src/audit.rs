//! Hash-chained audit trail of alert events

use crate::persistence::AuditSink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Event recorded when an SMS is delivered by the transport
pub const ALERT_SENT: &str = "alert_sent";

/// Event recorded when no transport is configured and the SMS is only logged
pub const ALERT_SIMULATED: &str = "alert_simulated";

/// Event recorded when the transport rejects or times out
pub const ALERT_FAILED: &str = "alert_failed";

const DEFAULT_MAX_EVENTS: usize = 1_000;

/// Audit trail with hash-chained events for tamper detection.
///
/// Only the newest `max_events` are kept in memory. The hash of the last
/// evicted event is remembered so the retained window still verifies.
pub struct AuditTrail {
    events: VecDeque<AuditEvent>,
    chain_hash: Option<String>,
    window_anchor: Option<String>,
    max_events: usize,
}

impl AuditTrail {
    /// Create a new audit trail
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Create a trail that retains at most `max_events` events
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            chain_hash: None,
            window_anchor: None,
            max_events: max_events.max(1),
        }
    }

    /// Link an event onto the chain, store it and return the chained copy
    pub fn chain_event(&mut self, mut event: AuditEvent) -> AuditEvent {
        event.previous_hash = self.chain_hash.clone();

        let hash = compute_hash(&event);
        event.hash = Some(hash.clone());
        self.chain_hash = Some(hash);

        self.events.push_back(event.clone());
        while self.events.len() > self.max_events {
            if let Some(evicted) = self.events.pop_front() {
                self.window_anchor = evicted.hash;
            }
        }

        event
    }

    /// Add an event to the audit trail
    pub fn add_event(&mut self, event: AuditEvent) {
        self.chain_event(event);
    }

    /// Verify the integrity of the retained window
    pub fn verify(&self) -> bool {
        let mut prev_hash = self.window_anchor.clone();

        for event in &self.events {
            if event.previous_hash != prev_hash {
                return false;
            }

            let computed_hash = compute_hash(event);
            if event.hash.as_ref() != Some(&computed_hash) {
                return false;
            }

            prev_hash = event.hash.clone();
        }

        true
    }

    /// Get retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();

    hasher.update(event.event_type.as_bytes());
    if let Some(ref data) = event.data {
        hasher.update(data.as_bytes());
    }
    hasher.update(format!("{:?}", event.timestamp).as_bytes());
    if let Some(ref prev) = event.previous_hash {
        hasher.update(prev.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// A single audit event in the trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event type, one of the `ALERT_*` constants for alert events
    pub event_type: String,

    /// Event data (JSON serialized)
    pub data: Option<String>,

    /// Timestamp
    pub timestamp: SystemTime,

    /// Hash of this event
    pub hash: Option<String>,

    /// Hash of previous event (for chaining)
    pub previous_hash: Option<String>,

    /// Severity level
    pub severity: AuditSeverity,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: None,
            timestamp: SystemTime::now(),
            hash: None,
            previous_hash: None,
            severity: AuditSeverity::Info,
        }
    }

    /// Set event data
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_string(&data).ok();
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    High,
    Critical,
}

/// Shared audit log: an in-memory trail plus an optional JSONL sink
#[derive(Clone)]
pub struct AuditLog {
    inner: Arc<Mutex<AuditLogInner>>,
}

struct AuditLogInner {
    trail: AuditTrail,
    sink: Option<AuditSink>,
}

impl AuditLog {
    /// In-memory only
    pub fn new(max_events: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLogInner {
                trail: AuditTrail::with_capacity(max_events),
                sink: None,
            })),
        }
    }

    /// Also append every event to a JSONL file
    pub fn with_sink(self, sink: AuditSink) -> Self {
        self.inner.lock().sink = Some(sink);
        self
    }

    /// Chain and store an event. Sink write failures are logged, never raised.
    pub fn record(&self, event: AuditEvent) {
        let mut inner = self.inner.lock();
        let event = inner.trail.chain_event(event);

        if let Some(sink) = inner.sink.as_mut() {
            if let Err(e) = sink.append(&event) {
                warn!("Failed to write audit event {}: {}", event.event_type, e);
            }
        }
    }

    /// Copy of retained events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().trail.events().cloned().collect()
    }

    /// Retained events of one type, oldest first
    pub fn events_of(&self, event_type: &str) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .trail
            .events()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn verify(&self) -> bool {
        self.inner.lock().trail.verify()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_trail() {
        let mut trail = AuditTrail::new();

        trail.add_event(AuditEvent::new(ALERT_SENT));
        trail.add_event(AuditEvent::new(ALERT_FAILED));

        assert!(trail.verify());
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn test_tamper_detection() {
        let mut trail = AuditTrail::new();

        trail.add_event(AuditEvent::new("event1"));
        trail.add_event(AuditEvent::new("event2"));

        // Tamper with an event
        trail.events[0].event_type = "tampered".to_string();

        // Verification should fail
        assert!(!trail.verify());
    }

    #[test]
    fn test_bounded_trail_still_verifies() {
        let mut trail = AuditTrail::with_capacity(3);

        for i in 0..10 {
            trail.add_event(AuditEvent::new(ALERT_SIMULATED).with_data(i));
        }

        assert_eq!(trail.len(), 3);
        assert_eq!(trail.events().next().unwrap().data.as_deref(), Some("7"));
        assert!(trail.verify());
    }

    #[test]
    fn test_audit_log_filters_by_type() {
        let log = AuditLog::new(10);

        log.record(AuditEvent::new(ALERT_SIMULATED).with_data("ALERT: FIRE detected"));
        log.record(AuditEvent::new(ALERT_FAILED).with_severity(AuditSeverity::Warning));

        let simulated = log.events_of(ALERT_SIMULATED);
        assert_eq!(simulated.len(), 1);
        assert!(simulated[0].data.as_deref().unwrap().contains("FIRE"));
        assert_eq!(log.events().len(), 2);
        assert!(log.verify());
    }
}
