//! Core types for Wildwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Class name carried by the sentinel record emitted when a classifier fails
pub const ERROR_CLASS: &str = "error";

/// Threat type of a verdict with no threat-positive record
pub const THREAT_TYPE_NONE: &str = "none";

/// Threat type of a threat-positive verdict whose class could not be picked
pub const THREAT_TYPE_UNKNOWN: &str = "unknown";

/// Axis-aligned box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One scored label from one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Label from the underlying model's vocabulary
    pub class_name: String,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,

    /// Whether the label is in the threat set and at or above threshold
    pub is_threat: bool,

    /// Bounding box (image sources only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Failure message (classifier-failure sentinel only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionRecord {
    /// Create a new detection record
    pub fn new(class_name: impl Into<String>, confidence: f32, is_threat: bool) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            is_threat,
            bounding_box: None,
            error: None,
        }
    }

    /// Attach a bounding box
    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    /// Sentinel record standing in for a failed classifier call
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            class_name: ERROR_CLASS.to_string(),
            confidence: 0.0,
            is_threat: false,
            bounding_box: None,
            error: Some(message.into()),
        }
    }

    /// Whether this is the classifier-failure sentinel
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The single reduction of a detection list for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub threat_detected: bool,
    pub threat_type: String,
    pub max_confidence: f32,
    pub detections: Vec<DetectionRecord>,
}

impl Verdict {
    /// Whether the detection list holds anything worth persisting.
    ///
    /// Empty lists and lists made only of failure sentinels are not.
    pub fn is_persistable(&self) -> bool {
        self.detections.iter().any(|d| !d.is_error())
    }

    /// Whether the classifier failed for this request
    pub fn has_classifier_error(&self) -> bool {
        self.detections.iter().any(DetectionRecord::is_error)
    }
}

/// Where the classified artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Image,
    Audio,
    Camera,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Camera => "camera",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution state of a stored threat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatStatus {
    #[default]
    Pending,
    Resolved,
}

impl ThreatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for ThreatStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => Err(crate::Error::input(format!("unknown threat status: {other}"))),
        }
    }
}

/// Geodetic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A stored verdict plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    /// Opaque identifier assigned at persistence time
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,

    pub threat_type: String,

    pub confidence: f32,

    pub source_type: SourceType,

    pub detections: Vec<DetectionRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,

    /// Present only if the source artifact was retained as evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub notified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: ThreatStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ThreatRecord {
    /// Build an unsaved record from a verdict. The id is assigned by the store.
    pub fn from_verdict(verdict: &Verdict, source_type: SourceType) -> Self {
        Self {
            id: String::new(),
            threat_type: verdict.threat_type.clone(),
            confidence: verdict.max_confidence,
            source_type,
            detections: verdict.detections.clone(),
            location: None,
            file_path: None,
            timestamp: Utc::now(),
            notified: false,
            notified_at: None,
            status: ThreatStatus::Pending,
            updated_at: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    pub fn with_file_path(mut self, file_path: Option<String>) -> Self {
        self.file_path = file_path;
        self
    }

    /// Add a metadata entry; `None` values are skipped
    pub fn with_metadata(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.into(), value);
        }
        self
    }

    pub fn location_desc(&self) -> Option<&str> {
        self.metadata.get("location_desc").map(String::as_str)
    }
}

/// A ranger's report on a stored threat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangerResponse {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,

    pub threat_id: String,

    pub ranger_name: String,

    pub action_taken: String,

    pub response_details: String,

    #[serde(default)]
    pub evidence_photos: Vec<String>,

    pub response_date: DateTime<Utc>,

    pub threat_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_sentinel() {
        let record = DetectionRecord::error("model exploded");
        assert!(record.is_error());
        assert_eq!(record.class_name, ERROR_CLASS);
        assert_eq!(record.confidence, 0.0);
        assert!(!record.is_threat);
    }

    #[test]
    fn test_detection_serialization_skips_empty_fields() {
        let record = DetectionRecord::new("Siren", 0.61, true);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["class_name"], "Siren");
        assert!(json.get("bounding_box").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_verdict_persistable() {
        let verdict = Verdict {
            threat_detected: false,
            threat_type: THREAT_TYPE_NONE.to_string(),
            max_confidence: 0.0,
            detections: vec![DetectionRecord::error("boom")],
        };
        assert!(!verdict.is_persistable());
        assert!(verdict.has_classifier_error());

        let verdict = Verdict {
            detections: vec![DetectionRecord::new("bird", 0.8, false)],
            ..verdict
        };
        assert!(verdict.is_persistable());
    }

    #[test]
    fn test_threat_record_uses_underscore_id() {
        let verdict = Verdict {
            threat_detected: true,
            threat_type: "person".to_string(),
            max_confidence: 0.9,
            detections: vec![DetectionRecord::new("person", 0.9, true)],
        };
        let mut record = ThreatRecord::from_verdict(&verdict, SourceType::Image)
            .with_metadata("filename", Some("cam.jpg".to_string()))
            .with_metadata("location_desc", None);
        record.id = "abc".to_string();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["source_type"], "image");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["metadata"]["filename"], "cam.jpg");
        assert!(record.location_desc().is_none());

        let back: ThreatRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "abc");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Resolved".parse::<ThreatStatus>().unwrap(), ThreatStatus::Resolved);
        assert!("closed".parse::<ThreatStatus>().is_err());
    }
}
