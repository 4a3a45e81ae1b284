//! Process-local store

use crate::store::{new_record_id, DetectionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use wildwatch_core::{RangerResponse, Result, ThreatRecord, ThreatStatus};

/// Indexed records in insertion order. Shared by the memory and journal stores.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    threats: HashMap<String, ThreatRecord>,
    threat_order: Vec<String>,
    responses: HashMap<String, RangerResponse>,
    response_order: Vec<String>,
}

impl StoreState {
    pub(crate) fn insert_threat(&mut self, record: ThreatRecord) {
        if !self.threats.contains_key(&record.id) {
            self.threat_order.push(record.id.clone());
        }
        self.threats.insert(record.id.clone(), record);
    }

    pub(crate) fn threat(&self, id: &str) -> Option<&ThreatRecord> {
        self.threats.get(id)
    }

    /// Returns `None` for an unknown id, otherwise whether anything changed
    pub(crate) fn mark_notified(&mut self, id: &str, at: DateTime<Utc>) -> Option<bool> {
        let record = self.threats.get_mut(id)?;
        if record.notified && record.notified_at.is_some() {
            return Some(false);
        }
        record.notified = true;
        record.notified_at = Some(at);
        Some(true)
    }

    /// Returns `None` for an unknown id, otherwise whether anything changed
    pub(crate) fn update_status(
        &mut self,
        id: &str,
        status: ThreatStatus,
        at: DateTime<Utc>,
    ) -> Option<bool> {
        let record = self.threats.get_mut(id)?;
        if record.status == status {
            return Some(false);
        }
        record.status = status;
        record.updated_at = Some(at);
        Some(true)
    }

    pub(crate) fn get_threat(&self, id: &str) -> Option<ThreatRecord> {
        self.threat(id).cloned()
    }

    pub(crate) fn recent_threats(&self, limit: usize) -> Vec<ThreatRecord> {
        self.threat_order
            .iter()
            .rev()
            .filter_map(|id| self.threats.get(id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn insert_response(&mut self, response: RangerResponse) {
        if !self.responses.contains_key(&response.id) {
            self.response_order.push(response.id.clone());
        }
        self.responses.insert(response.id.clone(), response);
    }

    pub(crate) fn get_response(&self, id: &str) -> Option<RangerResponse> {
        self.responses.get(id).cloned()
    }

    pub(crate) fn recent_responses(&self, limit: usize) -> Vec<RangerResponse> {
        self.response_order
            .iter()
            .rev()
            .filter_map(|id| self.responses.get(id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn threat_count(&self) -> usize {
        self.threats.len()
    }

    pub(crate) fn response_count(&self) -> usize {
        self.responses.len()
    }
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().threat_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn persist(&self, mut record: ThreatRecord) -> Result<String> {
        record.id = new_record_id();
        let id = record.id.clone();
        let mut state = self.state.write();
        record.timestamp = Utc::now();
        state.insert_threat(record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<ThreatRecord>> {
        Ok(self.state.read().get_threat(id))
    }

    async fn mark_notified(&self, id: &str) -> Result<bool> {
        Ok(self.state.write().mark_notified(id, Utc::now()).is_some())
    }

    async fn update_status(&self, id: &str, status: ThreatStatus) -> Result<bool> {
        Ok(self
            .state
            .write()
            .update_status(id, status, Utc::now())
            .is_some())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ThreatRecord>> {
        Ok(self.state.read().recent_threats(limit))
    }

    async fn store_ranger_response(&self, mut response: RangerResponse) -> Result<String> {
        response.id = new_record_id();
        let id = response.id.clone();
        self.state.write().insert_response(response);
        Ok(id)
    }

    async fn get_ranger_response(&self, id: &str) -> Result<Option<RangerResponse>> {
        Ok(self.state.read().get_response(id))
    }

    async fn list_ranger_responses(&self, limit: usize) -> Result<Vec<RangerResponse>> {
        Ok(self.state.read().recent_responses(limit))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
