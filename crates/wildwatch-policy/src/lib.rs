//! Wildwatch Policy
//!
//! The decision layer between classification and side effects:
//! - Verdict reduction over one request's detections
//! - Artifact retention (keep as evidence, delete, or defer)
//! - Alert composition and single-attempt SMS dispatch

pub mod alert;
pub mod dispatcher;
pub mod retention;
pub mod verdict;

pub use alert::{maps_link, Alert};
pub use dispatcher::{AlertDispatcher, SmsTransport, TwilioCredentials, TwilioTransport};
pub use retention::{disposition, should_retain, Disposition};
pub use verdict::reduce;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alert::Alert;
    pub use crate::dispatcher::{AlertDispatcher, SmsTransport};
    pub use crate::retention::{disposition, Disposition};
    pub use crate::verdict::reduce;
}
