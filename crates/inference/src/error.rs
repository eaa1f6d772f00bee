use thiserror::Error;

/// Failure modes of a single detection request.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Uploaded image is empty")]
    EmptyImage,

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Model output has unexpected shape: {0}")]
    MalformedOutput(String),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("Detection cancelled before inference")]
    Cancelled,
}

impl DetectError {
    /// True when the caller sent something unusable, false for server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DetectError::EmptyImage | DetectError::Decode(_))
    }
}
