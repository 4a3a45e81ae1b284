//! Detection pipeline shared by every analysis endpoint
//!
//! locate → classify → reduce → keep evidence → persist → delete or defer → alert → mark notified
//!
//! Only input validation and staging failures abort a request. Classifier,
//! store and transport failures degrade the response instead.

use crate::state::AppState;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use wildwatch_core::{DetectionRecord, GeoPoint, Result, SourceType, ThreatRecord, Verdict};
use wildwatch_policy::{disposition, reduce, Alert, Disposition};

/// Addressee of simulated alerts when no ranger phone is configured
pub const UNCONFIGURED_RECIPIENT: &str = "+1234567890";

/// One staged artifact to analyze
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: SourceType,
    /// Staged file in the temp directory
    pub artifact: PathBuf,
    /// Name the client gave the file
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notify: bool,
}

/// What happened to one request
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub verdict: Verdict,
    pub threat_id: Option<String>,
    pub location: LocationData,
    pub disposition: Disposition,
    /// `None` unless a notification was requested
    pub notification_sent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

impl LocationData {
    fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Body returned by every analysis endpoint
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub message: String,
    pub detections: Vec<DetectionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_id: Option<String>,
    pub location: Option<LocationData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sent: Option<bool>,
}

impl DetectionResponse {
    /// `summary` plus the threat type when one was found
    pub fn from_outcome(outcome: AnalysisOutcome, summary: String) -> Self {
        let message = if outcome.verdict.threat_detected {
            format!(
                "{} - THREAT DETECTED: {}",
                summary,
                outcome.verdict.threat_type.to_uppercase()
            )
        } else {
            summary
        };

        Self {
            success: true,
            message,
            detections: outcome.verdict.detections,
            threat_id: outcome.threat_id,
            location: Some(outcome.location),
            notification_sent: outcome.notification_sent,
        }
    }
}

/// Run the pipeline over a staged artifact. Consumes the artifact: on
/// return it has been kept as evidence, scheduled for deletion, or left
/// for the temp sweep.
pub async fn analyze(state: &AppState, request: AnalysisRequest) -> Result<AnalysisOutcome> {
    let source = request.source.as_str();
    state.metrics.record_request(source);

    let point = match crate::geo::resolve_location(
        request.latitude,
        request.longitude,
        &state.config.default_location,
    ) {
        Ok(point) => point,
        Err(e) => {
            state.artifacts.spawn_delete(request.artifact);
            return Err(e);
        }
    };

    let started = Instant::now();
    let detections = match request.source {
        SourceType::Image | SourceType::Camera => {
            state.classifiers.image().classify(&request.artifact).await
        }
        SourceType::Audio => state.classifiers.audio().classify(&request.artifact).await,
    };
    state
        .metrics
        .record_inference_latency(source, started.elapsed().as_micros() as u64);

    let verdict = reduce(&detections);
    if verdict.has_classifier_error() {
        state.metrics.record_classifier_error();
    }
    if verdict.threat_detected {
        state.metrics.record_threat(&verdict.threat_type);
    }
    debug!(
        "{} verdict for {}: {} ({:.3})",
        source, request.filename, verdict.threat_type, verdict.max_confidence
    );

    let description = state.geocoder.reverse(point).await;
    let location = LocationData {
        latitude: point.latitude,
        longitude: point.longitude,
        description,
    };

    // Evidence moves out of the sweep's reach before its record is written
    let kept = if verdict.threat_detected && state.store.is_connected() {
        keep_evidence(state, &request.artifact).await
    } else {
        None
    };

    let threat_id = if verdict.is_persistable() {
        persist(state, &request, &verdict, &location, kept.as_deref()).await
    } else {
        None
    };

    let disposition = disposition(&verdict, threat_id.is_some());
    match (disposition, kept) {
        (Disposition::Retain, Some(path)) => {
            debug!("Evidence for {:?} kept at {:?}", threat_id, path);
        }
        (Disposition::Retain, None) => {
            error!(
                "Threat {:?} stored without evidence; {:?} left in temp",
                threat_id, request.artifact
            );
        }
        (Disposition::Delete, _) => {
            state.artifacts.spawn_delete(request.artifact.clone());
        }
        (Disposition::Defer, kept) => {
            if let Some(path) = kept {
                if let Err(e) = state.artifacts.restore(&path, &request.artifact).await {
                    warn!("{}", e);
                }
            }
            info!(
                "Store write failed, leaving {:?} for the temp sweep",
                request.artifact
            );
        }
    }

    let notification_sent = if request.notify {
        Some(match (&threat_id, verdict.threat_detected) {
            (Some(id), true) => {
                let alert = Alert::from_verdict(&verdict)
                    .with_location(Some(location.point()))
                    .with_location_desc(location.description.clone());
                notify(state, &alert, id).await
            }
            _ => false,
        })
    } else {
        None
    };

    Ok(AnalysisOutcome {
        verdict,
        threat_id,
        location,
        disposition,
        notification_sent,
    })
}

/// Promote `artifact` to the evidence directory, or hold it in place
/// outside the sweep when that fails. `None` only if both fail.
async fn keep_evidence(state: &AppState, artifact: &Path) -> Option<PathBuf> {
    match state.artifacts.promote(artifact).await {
        Ok(path) => Some(path),
        Err(e) => {
            error!("Failed to retain evidence {:?}: {}", artifact, e);
            match state.artifacts.hold(artifact).await {
                Ok(path) => Some(path),
                Err(e) => {
                    error!("{}", e);
                    None
                }
            }
        }
    }
}

async fn persist(
    state: &AppState,
    request: &AnalysisRequest,
    verdict: &Verdict,
    location: &LocationData,
    evidence: Option<&Path>,
) -> Option<String> {
    let file_path = evidence.map(|p| p.to_string_lossy().into_owned());
    let evidence_error = (verdict.threat_detected && evidence.is_none())
        .then(|| "evidence could not be retained".to_string());

    let record = ThreatRecord::from_verdict(verdict, request.source)
        .with_location(Some(location.point()))
        .with_file_path(file_path)
        .with_metadata("filename", Some(request.filename.clone()))
        .with_metadata("location_desc", location.description.clone())
        .with_metadata("evidence_error", evidence_error);

    let threat_id = state.store.persist(record).await;
    match &threat_id {
        Some(id) => info!("Stored {} detection as {}", verdict.threat_type, id),
        None if state.store.is_connected() => state.metrics.record_store_failure("persist"),
        None => debug!("Store degraded, {} detection not stored", verdict.threat_type),
    }
    threat_id
}

/// Send one alert for stored threat `threat_id` and flag it notified on
/// success. Returns whether the alert went out.
pub async fn notify(state: &AppState, alert: &Alert, threat_id: &str) -> bool {
    let recipient = match state.recipient() {
        Some(recipient) => recipient,
        None if state.dispatcher.is_simulated() => UNCONFIGURED_RECIPIENT,
        None => {
            warn!(
                "Not alerting on threat {}: no ranger phone number configured",
                threat_id
            );
            state.metrics.record_notification(false);
            return false;
        }
    };

    let sent = state.dispatcher.dispatch(alert, recipient).await;
    state.metrics.record_notification(sent);

    if sent && !state.store.mark_notified(threat_id).await {
        warn!("Alert sent but threat {} could not be marked notified", threat_id);
        if state.store.is_connected() {
            state.metrics.record_store_failure("mark_notified");
        }
    }
    sent
}
