//! Verdict reduction
//!
//! One inference call produces a list of detection records; the reducer
//! collapses it into a single threat determination shared by every entry
//! point of the pipeline.

use wildwatch_core::{DetectionRecord, Verdict, THREAT_TYPE_NONE, THREAT_TYPE_UNKNOWN};

/// Reduce a detection list to one verdict.
///
/// The dominant threat is the first record reaching the highest confidence
/// among threat-positive records (strict `>`). Failure sentinels are skipped.
/// `threat_type` stays `"unknown"` only when every threat-positive record
/// scores exactly `0.0`, which needs a zero threshold.
pub fn reduce(detections: &[DetectionRecord]) -> Verdict {
    let mut threat_detected = false;
    let mut threat_type: &str = THREAT_TYPE_UNKNOWN;
    let mut max_confidence = 0.0f32;

    for detection in detections.iter().filter(|d| !d.is_error()) {
        if !detection.is_threat {
            continue;
        }
        threat_detected = true;
        if detection.confidence > max_confidence {
            max_confidence = detection.confidence;
            threat_type = detection.class_name.as_str();
        }
    }

    Verdict {
        threat_detected,
        threat_type: if threat_detected {
            threat_type.to_string()
        } else {
            THREAT_TYPE_NONE.to_string()
        },
        max_confidence,
        detections: detections.to_vec(),
    }
}
