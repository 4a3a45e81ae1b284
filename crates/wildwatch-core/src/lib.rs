//! Wildwatch Core
//!
//! Core types and error handling shared across Wildwatch components.
//!
//! This crate provides:
//! - Detection records and the per-request verdict they reduce to
//! - The persisted threat record and ranger response shapes
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    BoundingBox, DetectionRecord, GeoPoint, RangerResponse, SourceType, ThreatRecord,
    ThreatStatus, Verdict, ERROR_CLASS, THREAT_TYPE_NONE, THREAT_TYPE_UNKNOWN,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        BoundingBox, DetectionRecord, GeoPoint, RangerResponse, SourceType, ThreatRecord,
        ThreatStatus, Verdict,
    };
}
