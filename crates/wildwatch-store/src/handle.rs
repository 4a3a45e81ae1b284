//! Store handle held by the service
//!
//! Built once at startup. A handle is either connected to a backend or
//! degraded, in which case writes are skipped and reads report the store
//! as unavailable. Every backend call is bounded by a timeout.

use crate::store::DetectionStore;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wildwatch_core::{Error, RangerResponse, Result, ThreatRecord, ThreatStatus};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Store availability as decided at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Degraded { reason: String },
}

/// Degradable, time-bounded access to a [`DetectionStore`]
#[derive(Clone)]
pub struct StoreHandle {
    store: Option<Arc<dyn DetectionStore>>,
    health: StoreHealth,
    timeout: Duration,
}

impl StoreHandle {
    pub fn connected(store: Arc<dyn DetectionStore>) -> Self {
        Self {
            store: Some(store),
            health: StoreHealth::Connected,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("Detection store degraded: {}", reason);
        Self {
            store: None,
            health: StoreHealth::Degraded { reason },
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Bound every backend call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn health(&self) -> &StoreHealth {
        &self.health
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.store.as_deref().map(|s| s.name()).unwrap_or("none")
    }

    async fn call<'a, T, F>(
        &'a self,
        operation: &str,
        call: impl FnOnce(&'a dyn DetectionStore) -> F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>> + 'a,
    {
        let store = match (&self.store, &self.health) {
            (Some(store), _) => store.as_ref(),
            (None, StoreHealth::Degraded { reason }) => {
                return Err(Error::store_unavailable(reason.clone()))
            }
            (None, StoreHealth::Connected) => {
                return Err(Error::store_unavailable("no backend"))
            }
        };

        match tokio::time::timeout(self.timeout, call(store)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Store {} failed: {}", operation, e);
                Err(Error::store_unavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Store {} timed out after {:?}", operation, self.timeout);
                Err(Error::store_unavailable(format!("{} timed out", operation)))
            }
        }
    }

    /// Store a record. `None` when the store is degraded or the write failed.
    pub async fn persist(&self, record: ThreatRecord) -> Option<String> {
        if !self.is_connected() {
            debug!("Store degraded, not persisting {} record", record.threat_type);
            return None;
        }
        self.call("persist", move |s| s.persist(record)).await.ok()
    }

    /// Flag a record notified. `false` when unknown, degraded or failed.
    pub async fn mark_notified(&self, id: &str) -> bool {
        self.call("mark_notified", |s| s.mark_notified(id))
            .await
            .unwrap_or(false)
    }

    /// Change a record's status. `false` when unknown, degraded or failed.
    pub async fn update_status(&self, id: &str, status: ThreatStatus) -> bool {
        self.call("update_status", |s| s.update_status(id, status))
            .await
            .unwrap_or(false)
    }

    /// Store a ranger response. `None` when degraded or the write failed.
    pub async fn store_ranger_response(&self, response: RangerResponse) -> Option<String> {
        self.call("store_ranger_response", move |s| s.store_ranger_response(response))
            .await
            .ok()
    }

    /// Fetch a record. Errors only with [`Error::StoreUnavailable`].
    pub async fn get(&self, id: &str) -> Result<Option<ThreatRecord>> {
        self.call("get", |s| s.get(id)).await
    }

    /// Newest records first. Errors only with [`Error::StoreUnavailable`].
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ThreatRecord>> {
        self.call("list_recent", |s| s.list_recent(limit)).await
    }

    /// Fetch a ranger response. Errors only with [`Error::StoreUnavailable`].
    pub async fn get_ranger_response(&self, id: &str) -> Result<Option<RangerResponse>> {
        self.call("get_ranger_response", |s| s.get_ranger_response(id))
            .await
    }

    /// Newest ranger responses first. Errors only with [`Error::StoreUnavailable`].
    pub async fn list_ranger_responses(&self, limit: usize) -> Result<Vec<RangerResponse>> {
        self.call("list_ranger_responses", |s| s.list_ranger_responses(limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_degraded_handle_never_raises_on_writes() {
        let handle = StoreHandle::degraded("connection refused");
        let record = ThreatRecord::from_verdict(
            &wildwatch_core::Verdict {
                threat_detected: true,
                threat_type: "person".to_string(),
                max_confidence: 0.9,
                detections: vec![],
            },
            wildwatch_core::SourceType::Camera,
        );

        assert!(!handle.is_connected());
        assert_eq!(
            handle.health(),
            &StoreHealth::Degraded {
                reason: "connection refused".to_string()
            }
        );
        assert!(handle.persist(record).await.is_none());
        assert!(!handle.mark_notified("abc").await);
        assert!(!handle.update_status("abc", ThreatStatus::Resolved).await);
    }

    #[tokio::test]
    async fn test_degraded_reads_report_unavailable() {
        let handle = StoreHandle::degraded("disabled");

        let err = handle.list_recent(10).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connected_handle_delegates() {
        let handle = StoreHandle::connected(Arc::new(MemoryStore::new()));
        assert_eq!(handle.backend_name(), "memory");

        let record = ThreatRecord::from_verdict(
            &wildwatch_core::Verdict {
                threat_detected: false,
                threat_type: "none".to_string(),
                max_confidence: 0.0,
                detections: vec![],
            },
            wildwatch_core::SourceType::Image,
        );
        let id = handle.persist(record).await.unwrap();

        assert!(handle.mark_notified(&id).await);
        assert!(handle.get(&id).await.unwrap().unwrap().notified);
        assert_eq!(handle.list_recent(5).await.unwrap().len(), 1);
    }
}
