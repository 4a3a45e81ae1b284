//! Artifact retention policy
//!
//! Decides what happens to the uploaded or captured file once a request has
//! been classified and (maybe) persisted.

use serde::Serialize;
use wildwatch_core::Verdict;

/// What to do with the source artifact of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Keep the file as evidence for the stored threat
    Retain,
    /// Remove the temporary file in the background
    Delete,
    /// Leave the file alone; the stale sweep reclaims it later
    Defer,
}

/// Evidence is retained iff the threat verdict was stored
pub fn should_retain(verdict: &Verdict, persisted: bool) -> bool {
    persisted && verdict.threat_detected
}

/// Full retention decision.
///
/// A file whose record failed to persist is never deleted on the request
/// path, so a store outage does not destroy evidence.
pub fn disposition(verdict: &Verdict, persisted: bool) -> Disposition {
    if !verdict.is_persistable() {
        return Disposition::Delete;
    }
    if !persisted {
        return Disposition::Defer;
    }
    if should_retain(verdict, persisted) {
        Disposition::Retain
    } else {
        Disposition::Delete
    }
}
