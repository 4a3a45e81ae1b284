//! HTTP routes and handlers

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path as FsPath;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::media;
use crate::pipeline::{self, AnalysisRequest, DetectionResponse};
use crate::state::AppState;
use wildwatch_core::{RangerResponse, SourceType, ThreatRecord, ThreatStatus};
use wildwatch_policy::Alert;
use wildwatch_store::{is_record_id, StoreHealth};

const MAX_LIST_LIMIT: usize = 100;
const DEFAULT_THREAT_LIMIT: usize = 10;
const DEFAULT_RESPONSE_LIMIT: usize = 20;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/stats", get(stats))
        .route("/analyze-image/", post(analyze_image))
        .route("/analyze-audio/", post(analyze_audio))
        .route("/capture-and-analyze/", post(capture_and_analyze))
        .route("/manual-capture/", post(manual_capture))
        .route("/threats/", get(list_threats))
        .route("/threat-details/", get(missing_threat_id))
        .route("/threat-details/:threat_id", get(threat_details))
        .route("/notify/:threat_id", post(notify_threat))
        .route(
            "/ranger-response/",
            get(list_ranger_responses).post(submit_ranger_response),
        )
        .route("/ranger-response/:response_id", get(ranger_response_details))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Wildlife Threat Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            {"path": "/analyze-image/", "method": "POST", "description": "Analyze an uploaded image"},
            {"path": "/analyze-audio/", "method": "POST", "description": "Analyze an uploaded audio clip"},
            {"path": "/capture-and-analyze/", "method": "POST", "description": "Auto-capture an image from the camera and analyze it"},
            {"path": "/manual-capture/", "method": "POST", "description": "Manually capture an image from the camera and analyze it"},
            {"path": "/threats/", "method": "GET", "description": "Get recent threat detections"},
            {"path": "/threat-details/{threat_id}", "method": "GET", "description": "Get one threat detection"},
            {"path": "/notify/{threat_id}", "method": "POST", "description": "Send a notification for a specific threat"},
            {"path": "/ranger-response/", "method": "POST", "description": "Submit a ranger's response to a threat"},
            {"path": "/ranger-response/", "method": "GET", "description": "Get recent ranger responses"},
            {"path": "/ranger-response/{response_id}", "method": "GET", "description": "Get one ranger response"},
            {"path": "/health", "method": "GET", "description": "Service health"},
            {"path": "/metrics", "method": "GET", "description": "Prometheus metrics"},
            {"path": "/stats", "method": "GET", "description": "Pipeline counters"}
        ]
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let status = match state.store.health() {
        StoreHealth::Connected => "ok",
        StoreHealth::Degraded { .. } => "degraded",
    };

    Json(json!({
        "status": status,
        "store": state.store.health(),
        "store_backend": state.store.backend_name(),
        "image_detector": state.classifiers.image().detector_name(),
        "audio_classifier": state.classifiers.audio().classifier_name(),
        "sms": if state.dispatcher.is_simulated() { "simulated" } else { "twilio" },
        "camera": state.camera.is_available(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.metrics.snapshot();
    let audit = state.dispatcher.audit();

    Json(json!({
        "avg_inference_latency_us": snapshot.avg_inference_latency_us(),
        "threat_rate": snapshot.threat_rate(),
        "pipeline": snapshot,
        "audit_events": audit.events().len(),
        "audit_chain_valid": audit.verify(),
    }))
}

async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file("file")?;
    info!("Received image upload: {}", file.filename);

    let content_type = media::content_type(file.content_type.as_deref(), &file.filename);
    media::check_image(&content_type)?;
    let latitude = form.optional_f64("latitude")?;
    let longitude = form.optional_f64("longitude")?;
    let notify = form.flag("notify")?;

    let artifact = state
        .artifacts
        .write_temp(&file.filename, &file.content)
        .await?;
    let outcome = pipeline::analyze(
        &state,
        AnalysisRequest {
            source: SourceType::Image,
            artifact,
            filename: file.filename.clone(),
            latitude,
            longitude,
            notify,
        },
    )
    .await?;

    Ok(Json(DetectionResponse::from_outcome(
        outcome,
        format!("Successfully analyzed image: {}", file.filename),
    )))
}

async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file("file")?;
    let source = form.text("source").map(str::to_string);
    info!(
        "Received audio upload: {} (source: {})",
        file.filename,
        source.as_deref().unwrap_or("upload")
    );

    let content_type = media::content_type(file.content_type.as_deref(), &file.filename);
    media::check_audio(&content_type, source.as_deref())?;
    let latitude = form.optional_f64("latitude")?;
    let longitude = form.optional_f64("longitude")?;
    let notify = form.flag("notify")?;

    let staged = state
        .artifacts
        .write_temp(&file.filename, &file.content)
        .await?;
    let artifact = if media::is_mp3(&content_type, &file.filename) {
        transcode_upload(&state, staged, &file.filename).await?
    } else {
        staged
    };

    let outcome = pipeline::analyze(
        &state,
        AnalysisRequest {
            source: SourceType::Audio,
            artifact,
            filename: file.filename.clone(),
            latitude,
            longitude,
            notify,
        },
    )
    .await?;

    Ok(Json(DetectionResponse::from_outcome(
        outcome,
        format!("Successfully analyzed audio: {}", file.filename),
    )))
}

/// Replace a staged MP3 with its WAV transcoding
async fn transcode_upload(
    state: &AppState,
    staged: std::path::PathBuf,
    filename: &str,
) -> Result<std::path::PathBuf, AppError> {
    let stem = FsPath::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let wav = state.artifacts.temp_path(&format!("{}.wav", stem));

    let (src, dest) = (staged.clone(), wav.clone());
    let result = tokio::task::spawn_blocking(move || media::transcode_to_wav(&src, &dest))
        .await
        .map_err(|e| AppError::Internal(format!("Error processing audio: {}", e)))?;

    state.artifacts.delete(&staged).await;
    if let Err(e) = result {
        if wav.exists() {
            state.artifacts.delete(&wav).await;
        }
        return Err(e.into());
    }
    Ok(wav)
}

#[derive(Debug, Deserialize)]
struct CaptureParams {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    notify: bool,
}

async fn capture_and_analyze(
    State(state): State<AppState>,
    Query(params): Query<CaptureParams>,
) -> Result<Json<DetectionResponse>, AppError> {
    capture_and_run(state, params, "auto").await
}

async fn manual_capture(
    State(state): State<AppState>,
    Query(params): Query<CaptureParams>,
) -> Result<Json<DetectionResponse>, AppError> {
    capture_and_run(state, params, "manual").await
}

async fn capture_and_run(
    state: AppState,
    params: CaptureParams,
    trigger: &str,
) -> Result<Json<DetectionResponse>, AppError> {
    info!("{} capture request received", trigger);
    if !state.camera.is_available() {
        error!("Camera not initialized or not available");
        return Err(AppError::Internal(
            "Camera not available. Please check camera connection.".to_string(),
        ));
    }

    let artifact = state.artifacts.camera_path();
    if let Err(e) = state.camera.capture(&artifact).await {
        error!("Camera capture failed: {}", e);
        if artifact.exists() {
            state.artifacts.delete(&artifact).await;
        }
        return Err(AppError::Internal(
            "Failed to capture image from camera. Please check camera connection and permissions."
                .to_string(),
        ));
    }

    let filename = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("camera.jpg")
        .to_string();
    let outcome = pipeline::analyze(
        &state,
        AnalysisRequest {
            source: SourceType::Camera,
            artifact,
            filename,
            latitude: params.latitude,
            longitude: params.longitude,
            notify: params.notify,
        },
    )
    .await?;

    Ok(Json(DetectionResponse::from_outcome(
        outcome,
        "Successfully captured and analyzed image from camera".to_string(),
    )))
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

impl LimitParams {
    fn resolve(&self, default: usize) -> Result<usize, AppError> {
        let limit = self.limit.unwrap_or(default);
        if (1..=MAX_LIST_LIMIT).contains(&limit) {
            Ok(limit)
        } else {
            Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_LIST_LIMIT
            )))
        }
    }
}

async fn list_threats(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ThreatRecord>>, AppError> {
    let limit = params.resolve(DEFAULT_THREAT_LIMIT)?;
    Ok(Json(state.store.list_recent(limit).await?))
}

/// Reject placeholder and malformed ids before touching the store
fn check_id<'a>(id: &'a str, kind: &str) -> Result<&'a str, AppError> {
    let id = id.trim();
    if id.is_empty() || id == "undefined" || id == "null" {
        warn!("Invalid {} ID received: {:?}", kind, id);
        return Err(AppError::BadRequest(format!("Invalid {} ID provided", kind)));
    }
    if !is_record_id(id) {
        return Err(AppError::BadRequest(format!(
            "Invalid {} ID format: {}",
            kind, id
        )));
    }
    Ok(id)
}

async fn missing_threat_id() -> AppError {
    AppError::BadRequest("Invalid threat ID provided".to_string())
}

async fn threat_details(
    State(state): State<AppState>,
    Path(threat_id): Path<String>,
) -> Result<Json<ThreatRecord>, AppError> {
    let threat_id = check_id(&threat_id, "threat")?;

    state
        .store
        .get(threat_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Threat with ID {} not found", threat_id)))
}

async fn notify_threat(
    State(state): State<AppState>,
    Path(threat_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let threat_id = check_id(&threat_id, "threat")?;
    let record = state
        .store
        .get(threat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Threat with ID {} not found", threat_id)))?;

    let alert = Alert::from_record(&record);
    if pipeline::notify(&state, &alert, threat_id).await {
        Ok(Json(json!({
            "success": true,
            "message": format!("Notification sent for threat {}", threat_id),
        })))
    } else {
        Ok(Json(json!({
            "success": false,
            "message": "Failed to send notification",
        })))
    }
}

async fn submit_ranger_response(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let threat_id = check_id(form.required("threat_id")?, "threat")?.to_string();
    let ranger_name = form.required("ranger_name")?.to_string();
    let action_taken = form.required("action_taken")?.to_string();
    let response_details = form.required("response_details")?.to_string();

    let threat = state
        .store
        .get(&threat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Threat with ID {} not found", threat_id)))?;

    let mut evidence_photos = Vec::new();
    if let Some(photo) = form.files.remove("photo").filter(|p| !p.content.is_empty()) {
        let path = state
            .artifacts
            .save_ranger_photo(&photo.filename, &photo.content)
            .await?;
        evidence_photos.push(path.to_string_lossy().into_owned());
    }

    let response = RangerResponse {
        id: String::new(),
        threat_id: threat_id.clone(),
        ranger_name,
        action_taken,
        response_details,
        evidence_photos,
        response_date: Utc::now(),
        threat_type: threat.threat_type,
    };
    let response_id = state
        .store
        .store_ranger_response(response)
        .await
        .ok_or_else(|| AppError::Unavailable("Failed to store ranger response".to_string()))?;

    if !state
        .store
        .update_status(&threat_id, ThreatStatus::Resolved)
        .await
    {
        warn!("Ranger response {} stored but threat {} not resolved", response_id, threat_id);
    }
    info!("Ranger response {} recorded for threat {}", response_id, threat_id);

    Ok(Json(json!({
        "success": true,
        "message": "Ranger response submitted successfully",
        "response_id": response_id,
    })))
}

async fn list_ranger_responses(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<RangerResponse>>, AppError> {
    let limit = params.resolve(DEFAULT_RESPONSE_LIMIT)?;
    Ok(Json(state.store.list_ranger_responses(limit).await?))
}

async fn ranger_response_details(
    State(state): State<AppState>,
    Path(response_id): Path<String>,
) -> Result<Json<RangerResponse>, AppError> {
    let response_id = check_id(&response_id, "response")?;

    state
        .store
        .get_ranger_response(response_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Response with ID {} not found", response_id)))
}

async fn fallback() -> AppError {
    AppError::NotFound("Not Found".to_string())
}

/// One uploaded file part
struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    content: Bytes,
}

/// A multipart form, fully read
#[derive(Default)]
struct UploadForm {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let content = field.bytes().await?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            content,
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn take_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        self.files
            .remove(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing file field: {}", name)))
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing form field: {}", name)))
    }

    fn optional_f64(&self, name: &str) -> Result<Option<f64>, AppError> {
        self.text(name)
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid {}: {}", name, v)))
            })
            .transpose()
    }

    fn flag(&self, name: &str) -> Result<bool, AppError> {
        match self.text(name).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") | Some("0") | Some("no") | Some("off") => Ok(false),
            Some("true") | Some("1") | Some("yes") | Some("on") => Ok(true),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid {}: {}",
                name, other
            ))),
        }
    }
}

/// Errors surfaced to clients as `{"detail": message}`
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Rejected(StatusCode, String),
    Internal(String),
}

impl From<wildwatch_core::Error> for AppError {
    fn from(err: wildwatch_core::Error) -> Self {
        use wildwatch_core::Error;

        match err {
            Error::Input(msg) => AppError::BadRequest(msg),
            Error::NotFound(msg) => AppError::NotFound(msg),
            Error::StoreUnavailable(msg) => {
                AppError::Unavailable(format!("Detection store unavailable: {}", msg))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Rejected(err.status(), err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Rejected(status, msg) => (status, msg),
            AppError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
