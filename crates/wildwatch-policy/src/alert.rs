//! Alert composition

use serde::{Deserialize, Serialize};
use wildwatch_core::{GeoPoint, ThreatRecord, Verdict};

/// Everything the SMS text is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub threat_type: String,
    pub confidence: f64,
    pub location_desc: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Alert {
    pub fn new(threat_type: impl Into<String>, confidence: f64) -> Self {
        Self {
            threat_type: threat_type.into(),
            confidence,
            location_desc: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Alert for a fresh verdict
    pub fn from_verdict(verdict: &Verdict) -> Self {
        Self::new(verdict.threat_type.clone(), f64::from(verdict.max_confidence))
    }

    /// Alert for a stored record, e.g. when re-notifying
    pub fn from_record(record: &ThreatRecord) -> Self {
        Self::new(record.threat_type.clone(), f64::from(record.confidence))
            .with_location(record.location)
            .with_location_desc(record.location_desc().map(str::to_string))
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.latitude = location.map(|p| p.latitude);
        self.longitude = location.map(|p| p.longitude);
        self
    }

    pub fn with_location_desc(mut self, location_desc: Option<String>) -> Self {
        self.location_desc = location_desc;
        self
    }

    /// Confidence as a whole percentage
    pub fn confidence_percent(&self) -> i64 {
        (self.confidence * 100.0).round() as i64
    }

    /// Render the SMS body
    pub fn compose_message(&self) -> String {
        let mut message = format!(
            "ALERT: {} detected with {}% confidence.",
            self.threat_type.to_uppercase(),
            self.confidence_percent()
        );

        if let Some(ref desc) = self.location_desc {
            message.push_str(&format!("\nLocation: {}", desc));
        }

        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            message.push_str(&format!("\nLocation: {}", maps_link(lat, lon)));
        }

        message.push_str("\nPlease investigate immediately.");
        message
    }
}

/// Google Maps link for a coordinate pair
///
/// Whole-degree coordinates keep their decimal point (`78.0`, not `78`).
pub fn maps_link(latitude: f64, longitude: f64) -> String {
    format!(
        "https://maps.google.com/?q={},{}",
        coordinate(latitude),
        coordinate(longitude)
    )
}

fn coordinate(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}
