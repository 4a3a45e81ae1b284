//! Wildwatch Classifiers
//!
//! Adapters around the two black-box models the service relies on:
//! - an object detector scoring bounding boxes in still images
//! - an audio event classifier scoring short analysis frames of a clip
//!
//! Each adapter normalizes raw model output into `DetectionRecord`s and
//! applies a class-membership plus confidence-threshold threat policy.

pub mod adapter;
pub mod classifier;
pub mod config;
pub mod registry;
pub mod remote;

pub use adapter::{AudioAdapter, ImageAdapter, ThreatPolicy};
pub use classifier::{AudioClassifier, ClassifierKind, FrameScores, ImageDetector, RawDetection};
pub use config::{AudioModelSpec, ClassifierConfig, ImageModelSpec};
pub use registry::{load_config, ClassifierRegistry};
pub use remote::{RemoteAudioClassifier, RemoteImageDetector, UnconfiguredModel};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::adapter::{AudioAdapter, ImageAdapter, ThreatPolicy};
    pub use crate::classifier::{AudioClassifier, FrameScores, ImageDetector, RawDetection};
    pub use crate::registry::ClassifierRegistry;
}
