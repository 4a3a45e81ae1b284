//! Mock models for testing
//!
//! Provides configurable mock detectors and audio classifiers that can be used
//! to exercise the adapters without a running inference server.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wildwatch_classifiers::{
    AudioAdapter, AudioClassifier, ClassifierConfig, ClassifierRegistry, FrameScores,
    ImageAdapter, ImageDetector, RawDetection, ThreatPolicy,
};
use wildwatch_core::{Error, Result};

/// A mock detector with configurable output and latency
pub struct MockDetector {
    name: String,
    detections: Vec<RawDetection>,
    latency: Duration,
    call_count: AtomicUsize,
}

impl MockDetector {
    /// Create a new mock detector that finds nothing
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            detections: Vec::new(),
            latency: Duration::ZERO,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Add a detection to every result
    pub fn with_detection(mut self, class_name: &str, confidence: f32) -> Self {
        self.detections
            .push(RawDetection::new(class_name, confidence, [12.0, 34.0, 56.0, 78.0]));
        self
    }

    /// Set simulated latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Get the number of times detect was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageDetector for MockDetector {
    async fn detect(&self, _image: &Path) -> Result<Vec<RawDetection>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A mock audio classifier returning a fixed score matrix
pub struct MockAudioClassifier {
    scores: FrameScores,
}

impl MockAudioClassifier {
    pub fn new(class_names: &[&str], frames: Vec<Vec<f32>>) -> Self {
        Self {
            scores: FrameScores::new(class_names.iter().map(|s| s.to_string()).collect(), frames),
        }
    }
}

#[async_trait]
impl AudioClassifier for MockAudioClassifier {
    async fn score_frames(&self, _clip: &Path) -> Result<FrameScores> {
        Ok(self.scores.clone())
    }

    fn name(&self) -> &str {
        "mock-audio"
    }
}

/// A model that always fails
pub struct FailingModel {
    error_message: String,
}

impl FailingModel {
    pub fn new() -> Self {
        Self {
            error_message: "Simulated model failure".to_string(),
        }
    }

    /// Set a custom error message
    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }
}

#[async_trait]
impl ImageDetector for FailingModel {
    async fn detect(&self, _image: &Path) -> Result<Vec<RawDetection>> {
        Err(Error::classifier(&self.error_message))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[async_trait]
impl AudioClassifier for FailingModel {
    async fn score_frames(&self, _clip: &Path) -> Result<FrameScores> {
        Err(Error::classifier(&self.error_message))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn test_person_detection_is_threat() {
    let detector = Arc::new(MockDetector::new("mock").with_detection("person", 0.91));
    let adapter = ImageAdapter::new(detector.clone(), ThreatPolicy::image_default());

    let records = adapter.classify(Path::new("frame.jpg")).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].class_name, "person");
    assert_eq!(records[0].confidence, 0.91);
    assert!(records[0].is_threat);
    assert!(records[0].bounding_box.is_some());
    assert_eq!(detector.call_count(), 1);
}

#[tokio::test]
async fn test_low_confidence_threat_class_is_not_threat() {
    let detector = Arc::new(MockDetector::new("mock").with_detection("truck", 0.3));
    let adapter = ImageAdapter::new(detector, ThreatPolicy::image_default());

    let records = adapter.classify(Path::new("frame.jpg")).await;

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_threat);
}

#[tokio::test]
async fn test_empty_detection_list() {
    let adapter = ImageAdapter::new(Arc::new(MockDetector::new("mock")), ThreatPolicy::image_default());

    let records = adapter.classify(Path::new("frame.jpg")).await;
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_failing_detector_yields_single_sentinel() {
    let adapter = ImageAdapter::new(
        Arc::new(FailingModel::new().with_error("weights not loaded")),
        ThreatPolicy::image_default(),
    );

    let records = adapter.classify(Path::new("frame.jpg")).await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].class_name, "error");
    assert_eq!(records[0].confidence, 0.0);
    assert!(!records[0].is_threat);
    assert_eq!(records[0].error.as_deref(), Some("classifier error: weights not loaded"));
}

#[tokio::test]
async fn test_slow_detector_times_out_into_sentinel() {
    let adapter = ImageAdapter::new(
        Arc::new(
            MockDetector::new("slow")
                .with_detection("person", 0.9)
                .with_latency(Duration::from_millis(200)),
        ),
        ThreatPolicy::image_default(),
    )
    .with_limits(1, Duration::from_millis(10));

    let records = adapter.classify(Path::new("frame.jpg")).await;

    assert_eq!(records.len(), 1);
    assert!(records[0].is_error());
}

#[tokio::test]
async fn test_audio_chainsaw_clip() {
    let classifier = MockAudioClassifier::new(
        &["Speech", "Chainsaw", "Bird", "Wind", "Rain", "Siren"],
        vec![
            vec![0.10, 0.80, 0.05, 0.20, 0.01, 0.02],
            vec![0.12, 0.70, 0.07, 0.18, 0.03, 0.04],
        ],
    );
    let adapter = AudioAdapter::new(Arc::new(classifier), ThreatPolicy::audio_default());

    let records = adapter.classify(Path::new("clip.wav")).await;

    assert_eq!(records.len(), 5);
    assert_eq!(records[0].class_name, "Chainsaw");
    assert_eq!(records[0].confidence, 0.75);
    assert!(records[0].is_threat);
    assert!(records.iter().skip(1).all(|r| !r.is_threat));
    assert!(records.iter().all(|r| r.bounding_box.is_none()));
    assert!(records.iter().all(|r| r.class_name != "Rain"));
}

#[tokio::test]
async fn test_audio_ragged_output_becomes_sentinel() {
    let classifier = MockAudioClassifier::new(&["Speech", "Chainsaw"], vec![vec![0.5]]);
    let adapter = AudioAdapter::new(Arc::new(classifier), ThreatPolicy::audio_default());

    let records = adapter.classify(Path::new("clip.wav")).await;

    assert_eq!(records.len(), 1);
    assert!(records[0].is_error());
}

#[tokio::test]
async fn test_registry_with_mock_models() {
    let mut config = ClassifierConfig::default();
    config.audio.top_k = 1;

    let registry = ClassifierRegistry::with_models(
        &config,
        Arc::new(MockDetector::new("mock").with_detection("boat", 0.6)),
        Arc::new(MockAudioClassifier::new(&["Helicopter", "Bird"], vec![vec![0.2, 0.9]])),
    );

    let image = registry.image().classify(Path::new("frame.jpg")).await;
    assert!(image[0].is_threat);

    let audio = registry.audio().classify(Path::new("clip.wav")).await;
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].class_name, "Bird");
    assert!(!audio[0].is_threat);
}
