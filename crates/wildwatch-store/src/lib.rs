//! Wildwatch Store
//!
//! Persistence for threat records and ranger responses.
//!
//! - [`DetectionStore`]: the async storage contract
//! - [`MemoryStore`]: process-local store
//! - [`JsonlStore`]: append-only JSON-lines journal, replayed on open
//! - [`StoreHandle`]: what the service holds; time-bounded and never raises
//!   on the write path, so a store outage only degrades responses

pub mod handle;
pub mod jsonl;
pub mod memory;
pub mod store;

pub use handle::{StoreHandle, StoreHealth};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use store::{is_record_id, new_record_id, DetectionStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::handle::{StoreHandle, StoreHealth};
    pub use crate::store::DetectionStore;
}
