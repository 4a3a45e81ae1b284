//! Models served by an external inference server
//!
//! The detector and the audio classifier run out of process. Each request
//! uploads the artifact as multipart `file` and expects JSON back:
//!
//! - detector: `{"detections": [{"class_name", "confidence", "bbox": [x1, y1, x2, y2]}]}`
//! - audio classifier: `{"class_names": [...], "frames": [[score, ...], ...]}`

use crate::classifier::{AudioClassifier, FrameScores, ImageDetector, RawDetection};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use wildwatch_core::{Error, Result};

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<RawDetection>,
}

/// HTTP client for a remote inference endpoint
#[derive(Debug, Clone)]
struct RemoteEndpoint {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl RemoteEndpoint {
    fn new(name: &str, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            url: url.into(),
            client,
        }
    }

    async fn post_file<T>(&self, path: &Path, mime: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| Error::classifier(format!("invalid mime type {}: {}", mime, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::classifier(format!("{} request failed: {}", self.name, e)))?;

        if !response.status().is_success() {
            return Err(Error::classifier(format!(
                "{} returned {}",
                self.name,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::classifier(format!("{} returned malformed output: {}", self.name, e)))
    }
}

/// Object detector behind an HTTP endpoint
#[derive(Debug, Clone)]
pub struct RemoteImageDetector {
    endpoint: RemoteEndpoint,
}

impl RemoteImageDetector {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: RemoteEndpoint::new("remote-detector", url, client),
        }
    }
}

#[async_trait]
impl ImageDetector for RemoteImageDetector {
    async fn detect(&self, image: &Path) -> Result<Vec<RawDetection>> {
        let mime = mime_for(image, "image/jpeg");
        let response: DetectResponse = self.endpoint.post_file(image, mime).await?;
        Ok(response.detections)
    }

    fn name(&self) -> &str {
        &self.endpoint.name
    }
}

/// Audio classifier behind an HTTP endpoint
#[derive(Debug, Clone)]
pub struct RemoteAudioClassifier {
    endpoint: RemoteEndpoint,
}

impl RemoteAudioClassifier {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: RemoteEndpoint::new("remote-audio-classifier", url, client),
        }
    }
}

#[async_trait]
impl AudioClassifier for RemoteAudioClassifier {
    async fn score_frames(&self, clip: &Path) -> Result<FrameScores> {
        self.endpoint.post_file(clip, "audio/wav").await
    }

    fn name(&self) -> &str {
        &self.endpoint.name
    }
}

/// Stand-in used when no endpoint is configured. Every call fails, which the
/// adapters turn into an error detection.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl ImageDetector for UnconfiguredModel {
    async fn detect(&self, _image: &Path) -> Result<Vec<RawDetection>> {
        Err(Error::classifier("no image model endpoint configured"))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[async_trait]
impl AudioClassifier for UnconfiguredModel {
    async fn score_frames(&self, _clip: &Path) -> Result<FrameScores> {
        Err(Error::classifier("no audio model endpoint configured"))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

fn mime_for(path: &Path, fallback: &'static str) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_shape() {
        let json = r#"{"detections": [{"class_name": "boat", "confidence": 0.77, "bbox": [1, 2, 3, 4]}]}"#;
        let response: DetectResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.detections.len(), 1);
        assert_eq!(response.detections[0].class_name, "boat");
        assert_eq!(response.detections[0].bbox, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a/b.PNG"), "image/jpeg"), "image/png");
        assert_eq!(mime_for(Path::new("frame"), "image/jpeg"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_unconfigured_model_fails() {
        let model = UnconfiguredModel;
        assert!(ImageDetector::detect(&model, Path::new("x.jpg")).await.is_err());
        assert!(AudioClassifier::score_frames(&model, Path::new("x.wav")).await.is_err());
    }
}
