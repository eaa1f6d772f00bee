use crate::labels::ClassNames;
use ndarray::{ArrayD, ArrayViewD};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded detection model that maps a preprocessed NCHW tensor to the raw
/// YOLOv8 head output.
///
/// Backends need `&mut self` to run, so callers sharing one across threads
/// serialize access themselves (see [`crate::Detector`]).
pub trait InferenceBackend: Send {
    fn load_model(path: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
    fn infer(&mut self, images: ArrayViewD<'_, f32>) -> anyhow::Result<InferenceOutput>;

    /// Class names embedded in the model, if the backend can read them.
    fn class_names(&self) -> Option<ClassNames> {
        None
    }
}

pub struct InferenceOutput {
    pub predictions: ArrayD<f32>, // [1, 4 + num_classes, anchors] cxcywh in input pixels
}
