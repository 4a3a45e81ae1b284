//! Error types for Wildwatch

/// Result type alias using Wildwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Wildwatch operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing upload, unsupported media format
    #[error("input error: {0}")]
    Input(String),

    /// Model invocation failures
    #[error("classifier error: {0}")]
    Classifier(String),

    /// The detection store could not be reached
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// SMS transport failures
    #[error("transport error: {0}")]
    Transport(String),

    /// Temporary or evidence file handling
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Camera capture failures
    #[error("camera error: {0}")]
    Camera(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Lookup of an unknown record
    #[error("not found: {0}")]
    NotFound(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new input error
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new artifact error
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Create a new camera error
    pub fn camera(msg: impl Into<String>) -> Self {
        Self::Camera(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
