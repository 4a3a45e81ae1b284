//! Model traits and raw model output types

use async_trait::async_trait;
use wildwatch_core::{Error, Result};
use std::path::Path;

/// Black-box object detector: image in, scored boxes out
#[async_trait]
pub trait ImageDetector: Send + Sync {
    /// Run detection on the image stored at `image`
    async fn detect(&self, image: &Path) -> Result<Vec<RawDetection>>;

    /// Get the detector name
    fn name(&self) -> &str;
}

/// Black-box audio event classifier: clip in, per-frame class scores out
#[async_trait]
pub trait AudioClassifier: Send + Sync {
    /// Score every analysis frame of the mono 16 kHz WAV clip at `clip`
    async fn score_frames(&self, clip: &Path) -> Result<FrameScores>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// One detected box as produced by the detector
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawDetection {
    /// Label from the detector's vocabulary
    pub class_name: String,

    /// Unrounded confidence (0.0-1.0)
    pub confidence: f32,

    /// Box corners as `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Frame-by-class score matrix for one clip
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameScores {
    /// Class vocabulary, indexed like each frame's score row
    pub class_names: Vec<String>,

    /// One score row per analysis frame
    pub frames: Vec<Vec<f32>>,
}

impl FrameScores {
    pub fn new(class_names: Vec<String>, frames: Vec<Vec<f32>>) -> Self {
        Self {
            class_names,
            frames,
        }
    }

    /// Average each class's score across all frames.
    ///
    /// A clip with no frames yields all-zero means.
    pub fn mean_scores(&self) -> Result<Vec<f32>> {
        let width = self.class_names.len();
        let mut sums = vec![0.0f64; width];

        for (index, frame) in self.frames.iter().enumerate() {
            if frame.len() != width {
                return Err(Error::classifier(format!(
                    "frame {} has {} scores, expected {}",
                    index,
                    frame.len(),
                    width
                )));
            }
            for (sum, score) in sums.iter_mut().zip(frame) {
                *sum += f64::from(*score);
            }
        }

        let count = self.frames.len().max(1) as f64;
        Ok(sums.into_iter().map(|s| (s / count) as f32).collect())
    }
}

/// Media kind a classifier handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Image,
    Audio,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_scores() {
        let scores = FrameScores::new(
            vec!["Speech".into(), "Chainsaw".into()],
            vec![vec![0.2, 0.6], vec![0.4, 0.2]],
        );

        let means = scores.mean_scores().unwrap();
        assert!((means[0] - 0.3).abs() < 1e-6);
        assert!((means[1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mean_scores_rejects_ragged_frames() {
        let scores = FrameScores::new(vec!["Speech".into()], vec![vec![0.2, 0.6]]);
        assert!(scores.mean_scores().is_err());
    }

    #[test]
    fn test_mean_scores_without_frames() {
        let scores = FrameScores::new(vec!["Speech".into(), "Wind".into()], vec![]);
        assert_eq!(scores.mean_scores().unwrap(), vec![0.0, 0.0]);
    }
}
