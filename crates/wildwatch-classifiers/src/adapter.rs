//! Classifier adapters
//!
//! Wrap a black-box model, normalize its raw output into [`DetectionRecord`]s
//! and apply the threat policy to each record.
//!
//! Adapters never fail: a model error, a timeout or malformed output becomes a
//! single sentinel record (see [`DetectionRecord::error`]) so the request can
//! still be answered.

use crate::classifier::{AudioClassifier, ClassifierKind, FrameScores, ImageDetector, RawDetection};
use crate::config::{
    DEFAULT_AUDIO_THREAT_CLASSES, DEFAULT_AUDIO_THRESHOLD, DEFAULT_AUDIO_TOP_K,
    DEFAULT_IMAGE_THREAT_CLASSES, DEFAULT_IMAGE_THRESHOLD,
};
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};
use wildwatch_core::{BoundingBox, DetectionRecord, Error, Result};

/// Class-membership plus confidence-threshold rule
#[derive(Debug, Clone)]
pub struct ThreatPolicy {
    classes: HashSet<String>,
    threshold: f32,
}

impl ThreatPolicy {
    /// Create a policy from a threat vocabulary and threshold
    pub fn new<I, S>(classes: I, threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            threshold,
        }
    }

    /// Object detector policy
    pub fn image_default() -> Self {
        Self::new(DEFAULT_IMAGE_THREAT_CLASSES.iter().copied(), DEFAULT_IMAGE_THRESHOLD)
    }

    /// Audio classifier policy
    pub fn audio_default() -> Self {
        Self::new(DEFAULT_AUDIO_THREAT_CLASSES.iter().copied(), DEFAULT_AUDIO_THRESHOLD)
    }

    /// A label is a threat when it is in the vocabulary and scores at or above threshold
    pub fn is_threat(&self, class_name: &str, confidence: f32) -> bool {
        self.classes.contains(class_name) && confidence >= self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains(class_name)
    }
}

/// Bounds concurrency and duration of calls into a shared model
#[derive(Debug, Clone)]
struct InferenceGuard {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl InferenceGuard {
    fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::internal(format!("inference limiter closed: {}", e)))?;

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Timeout)?
    }
}

impl Default for InferenceGuard {
    fn default() -> Self {
        Self::new(num_cpus::get(), Duration::from_secs(30))
    }
}

/// Adapter around an object detector
#[derive(Clone)]
pub struct ImageAdapter {
    detector: Arc<dyn ImageDetector>,
    policy: ThreatPolicy,
    guard: InferenceGuard,
}

impl ImageAdapter {
    pub fn new(detector: Arc<dyn ImageDetector>, policy: ThreatPolicy) -> Self {
        Self {
            detector,
            policy,
            guard: InferenceGuard::default(),
        }
    }

    /// Set the concurrency bound and per-call timeout
    pub fn with_limits(mut self, max_concurrent: usize, timeout: Duration) -> Self {
        self.guard = InferenceGuard::new(max_concurrent, timeout);
        self
    }

    pub fn policy(&self) -> &ThreatPolicy {
        &self.policy
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Turn every detected box into one record. No cutoff is applied.
    ///
    /// The threshold applies to the raw score; rounding is for reporting.
    pub fn normalize(&self, raw: Vec<RawDetection>) -> Vec<DetectionRecord> {
        raw.into_iter()
            .map(|detection| {
                let is_threat = self
                    .policy
                    .is_threat(&detection.class_name, detection.confidence);
                let confidence = round_to(detection.confidence, 3);
                if is_threat {
                    log_threat(ClassifierKind::Image, &detection.class_name, confidence);
                }

                let [x1, y1, x2, y2] = detection.bbox;
                DetectionRecord::new(detection.class_name, confidence, is_threat).with_bounding_box(
                    BoundingBox::new(
                        round_to(x1, 2),
                        round_to(y1, 2),
                        round_to(x2, 2),
                        round_to(y2, 2),
                    ),
                )
            })
            .collect()
    }

    /// Run the detector on an image file and normalize its output
    pub async fn classify(&self, image: &Path) -> Vec<DetectionRecord> {
        let start = Instant::now();
        let raw = self.guard.run(self.detector.detect(image)).await;
        debug!(
            "{} finished in {}us",
            self.detector.name(),
            start.elapsed().as_micros()
        );

        match raw {
            Ok(raw) => self.normalize(raw),
            Err(e) => failure_sentinel(ClassifierKind::Image, e),
        }
    }
}

/// Adapter around an audio event classifier
#[derive(Clone)]
pub struct AudioAdapter {
    classifier: Arc<dyn AudioClassifier>,
    policy: ThreatPolicy,
    top_k: usize,
    guard: InferenceGuard,
}

impl AudioAdapter {
    pub fn new(classifier: Arc<dyn AudioClassifier>, policy: ThreatPolicy) -> Self {
        Self {
            classifier,
            policy,
            top_k: DEFAULT_AUDIO_TOP_K,
            guard: InferenceGuard::default(),
        }
    }

    /// Number of classes kept per clip
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the concurrency bound and per-call timeout
    pub fn with_limits(mut self, max_concurrent: usize, timeout: Duration) -> Self {
        self.guard = InferenceGuard::new(max_concurrent, timeout);
        self
    }

    pub fn policy(&self) -> &ThreatPolicy {
        &self.policy
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Average scores over all frames and keep the `top_k` classes,
    /// highest mean first.
    pub fn normalize(&self, scores: &FrameScores) -> Result<Vec<DetectionRecord>> {
        let means = scores.mean_scores()?;

        let mut order: Vec<usize> = (0..means.len()).collect();
        order.sort_by(|&a, &b| {
            means[b]
                .partial_cmp(&means[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(self.top_k);

        let records = order
            .into_iter()
            .map(|index| {
                let class_name = &scores.class_names[index];
                let confidence = round_to(means[index], 3);
                let is_threat = self.policy.is_threat(class_name, confidence);
                if is_threat {
                    log_threat(ClassifierKind::Audio, class_name, confidence);
                }
                DetectionRecord::new(class_name.clone(), confidence, is_threat)
            })
            .collect();

        Ok(records)
    }

    /// Run the classifier on a WAV clip and normalize its output
    pub async fn classify(&self, clip: &Path) -> Vec<DetectionRecord> {
        let start = Instant::now();
        let scores = self.guard.run(self.classifier.score_frames(clip)).await;
        debug!(
            "{} finished in {}us",
            self.classifier.name(),
            start.elapsed().as_micros()
        );

        match scores.and_then(|scores| self.normalize(&scores)) {
            Ok(records) => records,
            Err(e) => failure_sentinel(ClassifierKind::Audio, e),
        }
    }
}

fn log_threat(kind: ClassifierKind, class_name: &str, confidence: f32) {
    warn!(
        "Potential {} threat detected: {} with {:.2} confidence",
        kind.as_str(),
        class_name,
        confidence
    );
}

fn failure_sentinel(kind: ClassifierKind, e: Error) -> Vec<DetectionRecord> {
    error!("Error processing {}: {}", kind.as_str(), e);
    vec![DetectionRecord::error(e.to_string())]
}

fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f64.powi(decimals);
    ((f64::from(value) * factor).round() / factor) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedDetector(Vec<RawDetection>);

    #[async_trait]
    impl ImageDetector for FixedDetector {
        async fn detect(&self, _image: &Path) -> Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl AudioClassifier for BrokenClassifier {
        async fn score_frames(&self, _clip: &Path) -> Result<FrameScores> {
            Err(Error::classifier("tensor shape mismatch"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn audio_adapter() -> AudioAdapter {
        AudioAdapter::new(Arc::new(BrokenClassifier), ThreatPolicy::audio_default())
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let policy = ThreatPolicy::image_default();

        assert!(policy.is_threat("person", 0.45));
        assert!(!policy.is_threat("person", 0.449));
        assert!(!policy.is_threat("deer", 0.99));
    }

    #[test]
    fn test_image_threshold_uses_raw_score() {
        let adapter = ImageAdapter::new(
            Arc::new(FixedDetector(vec![])),
            ThreatPolicy::image_default(),
        );

        let records = adapter.normalize(vec![
            RawDetection::new("person", 0.4496, [0.0, 0.0, 1.0, 1.0]),
            RawDetection::new("person", 0.4501, [0.0, 0.0, 1.0, 1.0]),
        ]);

        assert_eq!(records[0].confidence, 0.45);
        assert!(!records[0].is_threat);
        assert_eq!(records[1].confidence, 0.45);
        assert!(records[1].is_threat);
    }

    #[test]
    fn test_image_normalize_keeps_every_box() {
        let adapter = ImageAdapter::new(
            Arc::new(FixedDetector(vec![])),
            ThreatPolicy::image_default(),
        );
        let raw = vec![
            RawDetection::new("person", 0.91234, [10.123, 20.456, 30.789, 40.001]),
            RawDetection::new("dog", 0.88, [0.0, 0.0, 1.0, 1.0]),
            RawDetection::new("car", 0.2, [0.0, 0.0, 1.0, 1.0]),
        ];

        let records = adapter.normalize(raw);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].confidence, 0.912);
        assert!(records[0].is_threat);
        assert_eq!(
            records[0].bounding_box,
            Some(BoundingBox::new(10.12, 20.46, 30.79, 40.0))
        );
        assert!(!records[1].is_threat);
        assert!(!records[2].is_threat);
    }

    #[test]
    fn test_audio_top_k_sorted_descending() {
        let adapter = audio_adapter().with_top_k(5);
        let class_names: Vec<String> = (0..10).map(|i| format!("class-{}", i)).collect();
        let frame: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let scores = FrameScores::new(class_names, vec![frame.clone(), frame]);

        let records = adapter.normalize(&scores).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].class_name, "class-9");
        assert_eq!(records[4].class_name, "class-5");
        assert!(records.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_audio_top_k_larger_than_vocabulary() {
        let adapter = audio_adapter().with_top_k(20);
        let scores = FrameScores::new(
            vec!["Siren".into(), "Wind".into()],
            vec![vec![0.5, 0.1]],
        );

        let records = adapter.normalize(&scores).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].class_name, "Siren");
        assert!(records[0].is_threat);
    }

    #[tokio::test]
    async fn test_audio_failure_becomes_sentinel() {
        let records = audio_adapter().classify(Path::new("missing.wav")).await;

        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());
        assert!(records[0]
            .error
            .as_deref()
            .unwrap()
            .contains("tensor shape mismatch"));
    }

    #[tokio::test]
    async fn test_image_classify_uses_detector() {
        let adapter = ImageAdapter::new(
            Arc::new(FixedDetector(vec![RawDetection::new("fire", 0.7, [0.0; 4])])),
            ThreatPolicy::image_default(),
        )
        .with_limits(1, Duration::from_secs(1));

        let records = adapter.classify(Path::new("frame.jpg")).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].class_name, "fire");
        assert!(records[0].is_threat);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.4446, 3), 0.445);
        assert_eq!(round_to(12.345, 2), 12.35);
    }
}
