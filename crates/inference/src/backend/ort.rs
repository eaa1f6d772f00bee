use super::{InferenceBackend, InferenceOutput};
use crate::{config::ExecutionProvider, labels::ClassNames};
use ndarray::ArrayViewD;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";
const NAMES_METADATA_KEY: &str = "names";

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        let mut builder = match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is disabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
                builder
            }
        };

        let session = builder.commit_from_file(path)?;

        tracing::info!("Model loaded from {}", path);
        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::Cpu, 4)
    }

    fn infer(&mut self, images: ArrayViewD<'_, f32>) -> anyhow::Result<InferenceOutput> {
        let outputs = self.session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(images)?
        ])?;

        let predictions = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            predictions: predictions.into_owned(),
        })
    }

    fn class_names(&self) -> Option<ClassNames> {
        let metadata = self.session.metadata().ok()?;
        let raw = metadata.custom(NAMES_METADATA_KEY)?;

        match ClassNames::from_model_metadata(&raw) {
            Ok(names) => {
                tracing::info!(classes = names.len(), "Using class names from model metadata");
                Some(names)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable class names in model metadata");
                None
            }
        }
    }
}
