//! Error types for the path tracer host.

use thiserror::Error;

/// Main error type for tracer operations.
///
/// The per-frame path has almost no failure modes: shape mismatches are
/// resolved by release-and-recreate and empty scenes are valid. What remains
/// are missing external resources, rejected input and GPU/device faults.
#[derive(Error, Debug)]
pub enum Error {
    /// A resource the compute program needs was never supplied
    #[error("Missing required resource: {0}")]
    MissingResource(&'static str),

    /// Renderable geometry that cannot be packed into the shared pools
    #[error("Invalid renderable '{name}': {reason}")]
    InvalidRenderable { name: String, reason: String },

    /// Settings value outside its accepted range
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Adapter, device or validation failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a GPU error from a message.
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Create an invalid renderable error.
    pub fn invalid_renderable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRenderable {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for tracer operations.
pub type Result<T> = std::result::Result<T, Error>;
