use common::{env_opt, env_or, env_parse};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);
pub const DEFAULT_TARGET_CLASSES: &[&str] = &["cell phone", "laptop"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => anyhow::bail!(
                "{} is not a supported execution provider. Use either `cpu` or `cuda`.",
                other
            ),
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda => f.write_str("cuda"),
        }
    }
}

/// Thresholds applied while decoding raw model output.
///
/// These mirror the stock YOLOv8 predictor, so they belong to the model's
/// predict step rather than to any service-level filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: String,
    pub labels_path: Option<String>,
    pub target_classes: Vec<String>,
    pub input_size: (u32, u32),
    pub decode: DecodeParams,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path = env_or("MODEL_PATH", "models/yolov8n.onnx");
        let labels_path = env_opt("LABELS_PATH");

        let target_classes = env_opt("TARGET_CLASSES")
            .map(|raw| parse_class_list(&raw))
            .unwrap_or_else(|| DEFAULT_TARGET_CLASSES.iter().map(|s| s.to_string()).collect());

        let input_width = env_parse("INPUT_WIDTH", DEFAULT_INPUT_SIZE.0)?;
        let input_height = env_parse("INPUT_HEIGHT", DEFAULT_INPUT_SIZE.1)?;

        let defaults = DecodeParams::default();
        let decode = DecodeParams {
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?,
            iou_threshold: env_parse("IOU_THRESHOLD", defaults.iou_threshold)?,
            max_detections: env_parse("MAX_DETECTIONS", defaults.max_detections)?,
        };

        let execution_provider = env_or("EXECUTION_PROVIDER", "cpu").parse()?;
        let intra_threads = env_parse("INTRA_THREADS", 4)?;

        if input_width == 0 || input_height == 0 {
            anyhow::bail!("INPUT_WIDTH and INPUT_HEIGHT must be non-zero");
        }

        Ok(Self {
            model_path,
            labels_path,
            target_classes,
            input_size: (input_width, input_height),
            decode,
            execution_provider,
            intra_threads,
        })
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            labels_path: None,
            target_classes: DEFAULT_TARGET_CLASSES.iter().map(|s| s.to_string()).collect(),
            input_size: DEFAULT_INPUT_SIZE,
            decode: DecodeParams::default(),
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 1,
        }
    }
}

/// Split a comma-separated class list, trimming blanks and dropping empties.
pub fn parse_class_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
