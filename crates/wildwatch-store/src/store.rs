//! Storage contract

use async_trait::async_trait;
use wildwatch_core::{RangerResponse, Result, ThreatRecord, ThreatStatus};

/// Async storage for threat records and ranger responses
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Store a new record and return its id. The record's `id` and
    /// `timestamp` are assigned at insertion, so listing order and
    /// timestamp order agree.
    async fn persist(&self, record: ThreatRecord) -> Result<String>;

    /// Fetch a record by id
    async fn get(&self, id: &str) -> Result<Option<ThreatRecord>>;

    /// Flag a record as notified. `notified_at` is set on the first call
    /// only; later calls leave it unchanged. Returns whether the record exists.
    async fn mark_notified(&self, id: &str) -> Result<bool>;

    /// Set a record's status. Returns whether the record exists.
    async fn update_status(&self, id: &str, status: ThreatStatus) -> Result<bool>;

    /// Up to `limit` records, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<ThreatRecord>>;

    /// Store a ranger response and return its id
    async fn store_ranger_response(&self, response: RangerResponse) -> Result<String>;

    /// Fetch a ranger response by id
    async fn get_ranger_response(&self, id: &str) -> Result<Option<RangerResponse>>;

    /// Up to `limit` ranger responses, newest first
    async fn list_ranger_responses(&self, limit: usize) -> Result<Vec<RangerResponse>>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Opaque 32-character hex id
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Whether `id` has the shape of an id from [`new_record_id`]
pub fn is_record_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_unique_hex() {
        let a = new_record_id();
        let b = new_record_id();

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_record_id(&a));
    }

    #[test]
    fn test_record_id_shape() {
        assert!(!is_record_id(""));
        assert!(!is_record_id("undefined"));
        assert!(!is_record_id("65f1c0ffee0000000000000z"));
        assert!(!is_record_id("0123456789abcdef0123456789abcdef0"));
        assert!(is_record_id("0123456789ABCDEF0123456789abcdef"));
    }
}
