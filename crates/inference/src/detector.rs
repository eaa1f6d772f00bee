use crate::{
    backend::{InferenceBackend, InferenceOutput},
    cancel::CancelFlag,
    config::{DecodeParams, InferenceConfig},
    error::DetectError,
    labels::{ClassNames, TargetClasses},
    processing::{
        post::{PostProcessor, Prediction},
        pre::PreProcessor,
    },
};
use common::span;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, RgbImage, metadata::Orientation};
use serde::Serialize;
use std::{io::Cursor, sync::Mutex};

/// One allowlisted object found in an uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub name: String,
    pub confidence: f32,
    pub bbox: [f32; 4], // x1, y1, x2, y2 in source pixels
}

/// Object-safe entry point used by the HTTP layer.
///
/// Implementations return [`DetectError::Cancelled`] instead of running the
/// model once `cancel` is set.
pub trait Detect: Send + Sync {
    fn detect(
        &self,
        image_bytes: &[u8],
        cancel: &CancelFlag,
    ) -> Result<Vec<DetectionResult>, DetectError>;
}

/// Decode, infer, filter: the whole request pipeline around one model.
///
/// The backend sits behind a mutex because a session run needs exclusive
/// access; decoding and pre/post-processing happen outside the lock.
pub struct Detector<B: InferenceBackend> {
    backend: Mutex<B>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    class_names: ClassNames,
    targets: TargetClasses,
}

impl<B: InferenceBackend> Detector<B> {
    pub fn new(
        backend: B,
        class_names: ClassNames,
        targets: TargetClasses,
        input_size: (u32, u32),
        decode: DecodeParams,
    ) -> Self {
        Self {
            backend: Mutex::new(backend),
            preprocessor: PreProcessor::new(input_size),
            postprocessor: PostProcessor::new(decode, class_names.len()),
            class_names,
            targets,
        }
    }

    /// Build a detector from configuration.
    ///
    /// Class names come from `labels_path` when set, then from the model
    /// itself, then fall back to the COCO table.
    pub fn from_config(backend: B, config: &InferenceConfig) -> anyhow::Result<Self> {
        let class_names = match (&config.labels_path, backend.class_names()) {
            (Some(path), _) => ClassNames::from_file(path)?,
            (None, Some(embedded)) => embedded,
            (None, None) => ClassNames::coco(),
        };
        let targets = TargetClasses::new(config.target_classes.iter().cloned());

        for missing in targets.missing_from(&class_names) {
            tracing::warn!(
                target_class = missing,
                "Target class is not produced by this model and will never match"
            );
        }

        tracing::info!(
            classes = class_names.len(),
            targets = ?targets.iter().collect::<Vec<_>>(),
            "Detector ready"
        );

        Ok(Self::new(
            backend,
            class_names,
            targets,
            config.input_size,
            config.decode,
        ))
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    pub fn targets(&self) -> &TargetClasses {
        &self.targets
    }

    /// Run the model on a decoded image and return every prediction, before
    /// allowlist filtering.
    pub fn predict(
        &self,
        image: &RgbImage,
        cancel: &CancelFlag,
    ) -> Result<Vec<Prediction>, DetectError> {
        if cancel.is_cancelled() {
            return Err(DetectError::Cancelled);
        }

        let preprocessed = self
            .preprocessor
            .preprocess(image)
            .map_err(DetectError::Inference)?;

        let InferenceOutput { predictions } = {
            let _s = span!("model_inference");
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| DetectError::Inference(anyhow::anyhow!("Inference backend lock poisoned")))?;

            // Callers may give up while queued on the lock
            if cancel.is_cancelled() {
                tracing::debug!("Dropping cancelled detection before inference");
                return Err(DetectError::Cancelled);
            }

            backend
                .infer(preprocessed.tensor.view())
                .map_err(DetectError::Inference)?
        };

        self.postprocessor
            .decode(&predictions.view(), &preprocessed.transform)
    }
}

impl<B: InferenceBackend> Detect for Detector<B> {
    fn detect(
        &self,
        image_bytes: &[u8],
        cancel: &CancelFlag,
    ) -> Result<Vec<DetectionResult>, DetectError> {
        let image = decode_image(image_bytes)?;
        let predictions = self.predict(&image, cancel)?;
        let results = select_targets(&predictions, &self.class_names, &self.targets);

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            predictions = predictions.len(),
            kept = results.len(),
            "Detection complete"
        );

        Ok(results)
    }
}

/// Decode an uploaded file into an upright 8-bit RGB image.
///
/// The EXIF orientation tag is applied, so pixel coordinates refer to the
/// image as it is meant to be displayed.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectError> {
    let _s = span!("decode_image");

    if bytes.is_empty() {
        return Err(DetectError::EmptyImage);
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    Ok(image.to_rgb8())
}

/// Keep predictions whose class name is allowlisted, in their original order.
pub fn select_targets(
    predictions: &[Prediction],
    class_names: &ClassNames,
    targets: &TargetClasses,
) -> Vec<DetectionResult> {
    predictions
        .iter()
        .filter_map(|p| {
            let name = class_names.get(p.class_id)?;
            targets.contains(name).then(|| DetectionResult {
                name: name.to_string(),
                confidence: p.confidence,
                bbox: p.bbox,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use ndarray::{Array, ArrayViewD, IxDyn};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const INPUT: u32 = 64;

    /// Backend that replays a fixed head output, in model input coordinates.
    struct ReplayBackend {
        rows: Vec<([f32; 4], usize, f32)>,
        names: Option<Vec<String>>,
        runs: Arc<AtomicUsize>,
    }

    impl ReplayBackend {
        fn new(rows: Vec<([f32; 4], usize, f32)>) -> Self {
            Self {
                rows,
                names: None,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl InferenceBackend for ReplayBackend {
        fn load_model(_path: &str) -> anyhow::Result<Self> {
            anyhow::bail!("replay backend has no model file")
        }

        fn infer(&mut self, images: ArrayViewD<'_, f32>) -> anyhow::Result<InferenceOutput> {
            assert_eq!(images.shape(), &[1, 3, INPUT as usize, INPUT as usize]);
            self.runs.fetch_add(1, Ordering::SeqCst);

            let mut out = Array::zeros(IxDyn(&[1, 84, self.rows.len()]));
            for (anchor, (bbox, class_id, score)) in self.rows.iter().enumerate() {
                for (c, v) in bbox.iter().enumerate() {
                    out[[0, c, anchor]] = *v;
                }
                out[[0, 4 + class_id, anchor]] = *score;
            }
            Ok(InferenceOutput { predictions: out })
        }

        fn class_names(&self) -> Option<ClassNames> {
            self.names.clone().map(ClassNames::new)
        }
    }

    /// JPEG carrying an EXIF APP1 segment with only the Orientation tag.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut encoded = Cursor::new(Vec::new());
        image.write_to(&mut encoded, ImageFormat::Jpeg).unwrap();
        let encoded = encoded.into_inner();

        let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]); // TIFF, little endian
        app1.extend_from_slice(&[0x01, 0x00]); // one IFD entry
        app1.extend_from_slice(&[
            0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, orientation, 0x00, 0x00, 0x00,
        ]);
        app1.extend_from_slice(&[0x00; 4]); // no next IFD

        [&encoded[..2], &app1[..], &encoded[2..]].concat()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([40, 80, 120]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn detector(rows: Vec<([f32; 4], usize, f32)>) -> Detector<ReplayBackend> {
        detector_with(ReplayBackend::new(rows))
    }

    fn detector_with(backend: ReplayBackend) -> Detector<ReplayBackend> {
        Detector::new(
            backend,
            ClassNames::coco(),
            TargetClasses::new(["cell phone", "laptop"]),
            (INPUT, INPUT),
            DecodeParams::default(),
        )
    }

    #[test]
    fn test_keeps_only_allowlisted_classes() {
        let detector = detector(vec![
            ([16.0, 16.0, 8.0, 8.0], 67, 0.9), // cell phone
            ([48.0, 48.0, 8.0, 8.0], 0, 0.95), // person
        ]);

        let results = detector.detect(&png(INPUT, INPUT), &CancelFlag::new()).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "cell phone");
        assert_eq!(results[0].confidence, 0.9);
        assert_eq!(results[0].bbox, [12.0, 12.0, 20.0, 20.0]);
    }

    #[test]
    fn test_low_confidence_passes_through_unmodified() {
        let detector = detector(vec![([32.0, 32.0, 10.0, 10.0], 63, 0.2631)]);

        let results = detector.detect(&png(INPUT, INPUT), &CancelFlag::new()).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence, 0.2631);
    }

    #[test]
    fn test_bbox_in_source_pixels() {
        // 128x64 source into 64x64: scale 0.5, offset_y 16
        let detector = detector(vec![([32.0, 32.0, 16.0, 8.0], 63, 0.8)]);

        let results = detector.detect(&png(128, 64), &CancelFlag::new()).unwrap();

        assert_eq!(results[0].bbox, [48.0, 24.0, 80.0, 40.0]);
    }

    #[test]
    fn test_results_ordered_by_confidence() {
        let detector = detector(vec![
            ([10.0, 10.0, 6.0, 6.0], 63, 0.5),
            ([30.0, 30.0, 6.0, 6.0], 0, 0.99),
            ([50.0, 50.0, 6.0, 6.0], 67, 0.7),
        ]);

        let results = detector.detect(&png(INPUT, INPUT), &CancelFlag::new()).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["cell phone", "laptop"]);
    }

    #[test]
    fn test_unknown_class_ids_are_dropped() {
        let predictions = vec![Prediction {
            class_id: 500,
            confidence: 0.9,
            bbox: [0.0, 0.0, 1.0, 1.0],
        }];

        let results = select_targets(
            &predictions,
            &ClassNames::coco(),
            &TargetClasses::new(["laptop"]),
        );

        assert!(results.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let detector = detector(vec![]);

        assert!(matches!(
            detector.detect(&[], &CancelFlag::new()),
            Err(DetectError::EmptyImage)
        ));
        assert!(matches!(
            detector.detect(b"GIF89a but truncated", &CancelFlag::new()),
            Err(DetectError::Decode(_))
        ));
    }

    #[test]
    fn test_repeatable_for_same_bytes() {
        let detector = detector(vec![
            ([16.0, 16.0, 8.0, 8.0], 67, 0.9),
            ([40.0, 40.0, 12.0, 12.0], 63, 0.6),
        ]);
        let bytes = png(100, 80);

        let first = detector.detect(&bytes, &CancelFlag::new()).unwrap();
        let second = detector.detect(&bytes, &CancelFlag::new()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_serializes_to_wire_shape() {
        let result = DetectionResult {
            name: "laptop".to_string(),
            confidence: 0.5,
            bbox: [1.0, 2.0, 3.0, 4.0],
        };

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"name": "laptop", "confidence": 0.5, "bbox": [1.0, 2.0, 3.0, 4.0]})
        );
    }

    #[test]
    fn test_from_config_class_name_precedence() {
        let mut config = InferenceConfig::test_default();
        config.input_size = (INPUT, INPUT);

        let embedded = ReplayBackend {
            names: Some(vec!["laptop".into()]),
            ..ReplayBackend::new(vec![])
        };
        let detector = Detector::from_config(embedded, &config).unwrap();
        assert_eq!(detector.class_names().len(), 1);

        let plain = ReplayBackend::new(vec![]);
        let detector = Detector::from_config(plain, &config).unwrap();
        assert_eq!(detector.class_names(), &ClassNames::coco());
        assert!(detector.targets().contains("cell phone"));

        config.labels_path = Some("/nonexistent/labels.txt".into());
        let plain = ReplayBackend::new(vec![]);
        assert!(Detector::from_config(plain, &config).is_err());
    }

    #[test]
    fn test_many_anchors_through_full_pipeline() {
        let detector = detector(vec![
            ([8.0, 8.0, 6.0, 6.0], 67, 0.9),
            ([24.0, 8.0, 6.0, 6.0], 63, 0.8),
            ([40.0, 8.0, 6.0, 6.0], 0, 0.95),
            ([56.0, 8.0, 6.0, 6.0], 2, 0.7),
            ([8.0, 40.0, 6.0, 6.0], 67, 0.5),
            ([40.0, 40.0, 6.0, 6.0], 63, 0.3),
        ]);

        let results = detector
            .detect(&png(INPUT, INPUT), &CancelFlag::new())
            .unwrap();

        let summary: Vec<(&str, f32)> = results
            .iter()
            .map(|r| (r.name.as_str(), r.confidence))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("cell phone", 0.9),
                ("laptop", 0.8),
                ("cell phone", 0.5),
                ("laptop", 0.3)
            ]
        );
        assert_eq!(results[0].bbox, [5.0, 5.0, 11.0, 11.0]);
    }

    #[test]
    fn test_cancelled_detection_skips_the_model() {
        let backend = ReplayBackend::new(vec![([16.0, 16.0, 8.0, 8.0], 67, 0.9)]);
        let runs = backend.runs.clone();
        let detector = detector_with(backend);
        let bytes = png(INPUT, INPUT);

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            detector.detect(&bytes, &cancel),
            Err(DetectError::Cancelled)
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(detector.detect(&bytes, &CancelFlag::new()).unwrap().len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exif_orientation_is_applied() {
        // Orientation 6: stored landscape, displayed rotated 90 degrees clockwise
        let rotated = decode_image(&jpeg_with_orientation(100, 50, 6)).unwrap();
        assert_eq!(rotated.dimensions(), (50, 100));

        let upright = decode_image(&jpeg_with_orientation(100, 50, 1)).unwrap();
        assert_eq!(upright.dimensions(), (100, 50));
    }

    #[test]
    fn test_boxes_use_rotated_frame() {
        let detector = detector(vec![([32.0, 32.0, 16.0, 16.0], 63, 0.8)]);

        // 100x50 stored, 50x100 displayed: scale 0.64, offset_x 16
        let results = detector
            .detect(&jpeg_with_orientation(100, 50, 6), &CancelFlag::new())
            .unwrap();

        let [x1, y1, x2, y2] = results[0].bbox;
        assert!(x2 <= 50.0 && y2 <= 100.0);
        assert!((x1 - 12.5).abs() < 0.1 && (x2 - 37.5).abs() < 0.1);
        assert!((y1 - 37.5).abs() < 0.1 && (y2 - 62.5).abs() < 0.1);
    }
}
