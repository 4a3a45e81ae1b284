//! Classifier registry initialization and management

use crate::{
    AudioAdapter, AudioClassifier, ClassifierConfig, ImageAdapter, ImageDetector,
    RemoteAudioClassifier, RemoteImageDetector, ThreatPolicy, UnconfiguredModel,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use wildwatch_core::Result;

/// The two adapters the service classifies with, loaded once at startup
#[derive(Clone)]
pub struct ClassifierRegistry {
    image: ImageAdapter,
    audio: AudioAdapter,
}

impl ClassifierRegistry {
    /// Assemble a registry from already-built adapters
    pub fn new(image: ImageAdapter, audio: AudioAdapter) -> Self {
        Self { image, audio }
    }

    /// Build adapters from configuration, connecting to remote models
    pub fn from_config(config: &ClassifierConfig, client: reqwest::Client) -> Self {
        info!("Initializing classifiers");

        let detector: Arc<dyn ImageDetector> = match &config.image.endpoint {
            Some(url) => {
                info!("Image detector endpoint: {}", url);
                Arc::new(RemoteImageDetector::new(url.clone(), client.clone()))
            }
            None => {
                warn!("No image detector endpoint configured; image requests will report errors");
                Arc::new(UnconfiguredModel)
            }
        };

        let classifier: Arc<dyn AudioClassifier> = match &config.audio.endpoint {
            Some(url) => {
                info!("Audio classifier endpoint: {}", url);
                Arc::new(RemoteAudioClassifier::new(url.clone(), client))
            }
            None => {
                warn!("No audio classifier endpoint configured; audio requests will report errors");
                Arc::new(UnconfiguredModel)
            }
        };

        Self::with_models(config, detector, classifier)
    }

    /// Build adapters from configuration around the given models
    pub fn with_models(
        config: &ClassifierConfig,
        detector: Arc<dyn ImageDetector>,
        classifier: Arc<dyn AudioClassifier>,
    ) -> Self {
        let timeout = config.inference_timeout();

        let image = ImageAdapter::new(
            detector,
            ThreatPolicy::new(config.image.threat_classes.iter().cloned(), config.image.threshold),
        )
        .with_limits(config.max_concurrent_inferences, timeout);

        let audio = AudioAdapter::new(
            classifier,
            ThreatPolicy::new(config.audio.threat_classes.iter().cloned(), config.audio.threshold),
        )
        .with_top_k(config.audio.top_k)
        .with_limits(config.max_concurrent_inferences, timeout);

        info!(
            "Classifiers ready (image threshold {:.2}, audio threshold {:.2}, top-k {})",
            config.image.threshold, config.audio.threshold, config.audio.top_k
        );

        Self { image, audio }
    }

    pub fn image(&self) -> &ImageAdapter {
        &self.image
    }

    pub fn audio(&self) -> &AudioAdapter {
        &self.audio
    }
}

/// Load classifier configuration from file
pub fn load_config(path: impl AsRef<Path>) -> Result<ClassifierConfig> {
    ClassifierConfig::from_file(path.as_ref()).map_err(|e| {
        wildwatch_core::Error::config(format!("Failed to load classifiers config: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let yaml = r#"
image:
  threshold: 0.5
audio:
  top_k: 7
"#;

        let temp_file = std::env::temp_dir().join(format!("wildwatch_classifiers_{}.yaml", std::process::id()));
        std::fs::write(&temp_file, yaml).unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.image.threshold, 0.5);
        assert_eq!(config.audio.top_k, 7);

        std::fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_from_config_applies_policy() {
        let mut config = ClassifierConfig::default();
        config.image.threshold = 0.8;
        config.audio.top_k = 2;

        let registry = ClassifierRegistry::from_config(&config, reqwest::Client::new());

        assert_eq!(registry.image().policy().threshold(), 0.8);
        assert!(registry.image().policy().contains("chainsaw"));
        assert_eq!(registry.audio().top_k(), 2);
        assert_eq!(registry.image().detector_name(), "unconfigured");
    }
}
