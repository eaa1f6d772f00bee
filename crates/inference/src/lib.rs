pub mod backend;
pub mod cancel;
pub mod config;
pub mod detector;
pub mod error;
pub mod labels;
pub mod processing;

pub use backend::{InferenceBackend, InferenceOutput};
pub use cancel::{CancelFlag, CancelOnDrop};
pub use config::{DecodeParams, ExecutionProvider, InferenceConfig};
pub use detector::{Detect, DetectionResult, Detector, decode_image, select_targets};
pub use error::DetectError;
pub use labels::{ClassNames, TargetClasses};

#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;

/// Load the ONNX model named by `config` and wrap it in a [`Detector`].
#[cfg(feature = "ort-backend")]
pub fn load_detector(config: &InferenceConfig) -> anyhow::Result<Detector<OrtBackend>> {
    tracing::info!(
        model_path = %config.model_path,
        provider = %config.execution_provider,
        "Loading inference model"
    );
    let backend = OrtBackend::load_model_with_provider(
        &config.model_path,
        config.execution_provider,
        config.intra_threads,
    )?;
    Detector::from_config(backend, config)
}
