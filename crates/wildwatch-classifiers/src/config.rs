//! Configuration for classifiers and their threat policies

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Labels the object detector reports that count as threats
pub const DEFAULT_IMAGE_THREAT_CLASSES: &[&str] = &[
    "person",
    "car",
    "motorcycle",
    "truck",
    "boat",
    "fire",
    "smoke",
    "gun",
    "knife",
    "axe",
    "chainsaw",
];

/// Labels the audio classifier reports that count as threats
pub const DEFAULT_AUDIO_THREAT_CLASSES: &[&str] = &[
    "Gunshot, gunfire",
    "Explosion",
    "Chainsaw",
    "Vehicle",
    "Engine",
    "Motorboat, speedboat",
    "Helicopter",
    "Truck",
    "Screaming",
    "Emergency vehicle",
    "Siren",
    "Fire alarm",
    "Civil defense siren",
    "Mechanical saw",
    "Tools",
    "Construction",
];

pub const DEFAULT_IMAGE_THRESHOLD: f32 = 0.45;
pub const DEFAULT_AUDIO_THRESHOLD: f32 = 0.40;
pub const DEFAULT_AUDIO_TOP_K: usize = 5;

/// Configuration for all classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Object detector settings
    #[serde(default)]
    pub image: ImageModelSpec,

    /// Audio classifier settings
    #[serde(default)]
    pub audio: AudioModelSpec,

    /// Upper bound on inference calls in flight per model.
    /// Set to 1 for backends that are not reentrant.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_inferences: usize,

    /// Per-call inference timeout in milliseconds
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
}

/// Object detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageModelSpec {
    /// Threat vocabulary
    #[serde(default = "default_image_classes")]
    pub threat_classes: Vec<String>,

    /// Minimum confidence for a threat class to count
    #[serde(default = "default_image_threshold")]
    pub threshold: f32,

    /// Inference server URL; detection fails when unset
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Audio classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioModelSpec {
    /// Threat vocabulary
    #[serde(default = "default_audio_classes")]
    pub threat_classes: Vec<String>,

    /// Minimum mean score for a threat class to count
    #[serde(default = "default_audio_threshold")]
    pub threshold: f32,

    /// Number of highest-scoring classes kept per clip
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Inference server URL; classification fails when unset
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            image: ImageModelSpec::default(),
            audio: AudioModelSpec::default(),
            max_concurrent_inferences: default_max_concurrent(),
            inference_timeout_ms: default_inference_timeout_ms(),
        }
    }
}

impl Default for ImageModelSpec {
    fn default() -> Self {
        Self {
            threat_classes: default_image_classes(),
            threshold: DEFAULT_IMAGE_THRESHOLD,
            endpoint: None,
        }
    }
}

impl Default for AudioModelSpec {
    fn default() -> Self {
        Self {
            threat_classes: default_audio_classes(),
            threshold: DEFAULT_AUDIO_THRESHOLD,
            top_k: DEFAULT_AUDIO_TOP_K,
            endpoint: None,
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

fn default_image_classes() -> Vec<String> {
    DEFAULT_IMAGE_THREAT_CLASSES.iter().map(|s| s.to_string()).collect()
}

fn default_audio_classes() -> Vec<String> {
    DEFAULT_AUDIO_THREAT_CLASSES.iter().map(|s| s.to_string()).collect()
}

fn default_image_threshold() -> f32 {
    DEFAULT_IMAGE_THRESHOLD
}

fn default_audio_threshold() -> f32 {
    DEFAULT_AUDIO_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_AUDIO_TOP_K
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

fn default_inference_timeout_ms() -> u64 {
    30_000
}
