//! Behaviour every store backend must share, plus handle timeouts

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wildwatch_core::{
    DetectionRecord, GeoPoint, RangerResponse, Result, SourceType, ThreatRecord, ThreatStatus,
    Verdict,
};
use wildwatch_store::{DetectionStore, JsonlStore, MemoryStore, StoreHandle};

fn threat_record(threat_type: &str, confidence: f32) -> ThreatRecord {
    let verdict = Verdict {
        threat_detected: true,
        threat_type: threat_type.to_string(),
        max_confidence: confidence,
        detections: vec![DetectionRecord::new(threat_type, confidence, true)],
    };
    ThreatRecord::from_verdict(&verdict, SourceType::Image)
        .with_location(Some(GeoPoint::new(10.79, 78.70)))
        .with_metadata("location_desc", Some("Tiruchirappalli".to_string()))
}

async fn exercise(store: &dyn DetectionStore) {
    let first = store.persist(threat_record("person", 0.9)).await.unwrap();
    let second = store.persist(threat_record("fire", 0.7)).await.unwrap();
    assert_ne!(first, second);

    let stored = store.get(&first).await.unwrap().unwrap();
    assert_eq!(stored.location_desc(), Some("Tiruchirappalli"));
    assert_eq!(stored.status, ThreatStatus::Pending);

    assert!(store.mark_notified(&first).await.unwrap());
    let notified_at = store.get(&first).await.unwrap().unwrap().notified_at;
    assert!(notified_at.is_some());
    assert!(store.mark_notified(&first).await.unwrap());
    assert_eq!(store.get(&first).await.unwrap().unwrap().notified_at, notified_at);

    assert!(store.update_status(&second, ThreatStatus::Resolved).await.unwrap());
    assert!(!store.update_status("nope", ThreatStatus::Resolved).await.unwrap());

    let recent = store.list_recent(10).await.unwrap();
    assert_eq!(
        recent.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec![second.as_str(), first.as_str()]
    );
    assert_eq!(store.list_recent(1).await.unwrap().len(), 1);

    let response_id = store
        .store_ranger_response(RangerResponse {
            id: String::new(),
            threat_id: second.clone(),
            ranger_name: "Meena".to_string(),
            action_taken: "Extinguished".to_string(),
            response_details: "Campfire left burning".to_string(),
            evidence_photos: vec![],
            response_date: Utc::now(),
            threat_type: "fire".to_string(),
        })
        .await
        .unwrap();
    let response = store.get_ranger_response(&response_id).await.unwrap().unwrap();
    assert_eq!(response.threat_id, second);
    assert_eq!(store.list_ranger_responses(20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_jsonl_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = JsonlStore::open(dir.path().join("threats.jsonl")).unwrap();
    exercise(&store).await;
}

/// A backend that never answers in time
struct StalledStore;

#[async_trait]
impl DetectionStore for StalledStore {
    async fn persist(&self, _record: ThreatRecord) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("late".to_string())
    }

    async fn get(&self, _id: &str) -> Result<Option<ThreatRecord>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }

    async fn mark_notified(&self, _id: &str) -> Result<bool> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }

    async fn update_status(&self, _id: &str, _status: ThreatStatus) -> Result<bool> {
        Ok(true)
    }

    async fn list_recent(&self, _limit: usize) -> Result<Vec<ThreatRecord>> {
        Ok(vec![])
    }

    async fn store_ranger_response(&self, _response: RangerResponse) -> Result<String> {
        Ok("r".to_string())
    }

    async fn get_ranger_response(&self, _id: &str) -> Result<Option<RangerResponse>> {
        Ok(None)
    }

    async fn list_ranger_responses(&self, _limit: usize) -> Result<Vec<RangerResponse>> {
        Ok(vec![])
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn test_handle_times_out_slow_backend() {
    let handle = StoreHandle::connected(Arc::new(StalledStore))
        .with_timeout(Duration::from_millis(20));

    assert!(handle.persist(threat_record("boat", 0.5)).await.is_none());
    assert!(!handle.mark_notified("x").await);
    assert!(handle.get("x").await.is_err());
    assert!(handle.update_status("x", ThreatStatus::Resolved).await);
}
