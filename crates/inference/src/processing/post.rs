use super::pre::LetterboxTransform;
use crate::config::DecodeParams;
use crate::error::DetectError;
use ndarray::ArrayViewD;
use std::cmp::Ordering;

/// Number of box channels (cx, cy, w, h) ahead of the class scores.
const BOX_CHANNELS: usize = 4;

/// One decoded detection before class-name resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: [f32; 4], // x1, y1, x2, y2
}

impl Prediction {
    fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    fn iou(&self, other: &Prediction) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        let intersection = if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        };
        let union = self.area() + other.area() - intersection;

        if union > 0.0 { intersection / union } else { 0.0 }
    }
}

pub struct PostProcessor {
    pub params: DecodeParams,
    pub num_classes: usize,
}

impl PostProcessor {
    pub fn new(params: DecodeParams, num_classes: usize) -> Self {
        Self {
            params,
            num_classes,
        }
    }

    /// Decode a YOLOv8 head output into predictions in source-image pixels.
    ///
    /// Accepts `[1, 4 + nc, anchors]` (the exported default) or the transposed
    /// `[1, anchors, 4 + nc]`, where `nc` is the configured class count.
    /// Results are ordered by descending confidence.
    #[tracing::instrument(skip_all, fields(shape = ?output.shape()))]
    pub fn decode(
        &self,
        output: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
    ) -> Result<Vec<Prediction>, DetectError> {
        let layout = Layout::from_shape(output.shape(), self.num_classes)?;

        let candidates = self.collect_candidates(output, layout);
        let kept = non_max_suppression(
            candidates,
            self.params.iou_threshold,
            self.params.max_detections,
        );

        let predictions: Vec<Prediction> = kept
            .into_iter()
            .filter_map(|p| to_source_space(p, transform))
            .collect();

        tracing::trace!(count = predictions.len(), "Decoded predictions");
        Ok(predictions)
    }

    fn collect_candidates(&self, output: &ArrayViewD<f32>, layout: Layout) -> Vec<Prediction> {
        let value = |channel: usize, anchor: usize| -> f32 {
            if layout.channels_first {
                output[[0, channel, anchor]]
            } else {
                output[[0, anchor, channel]]
            }
        };

        let mut candidates = Vec::new();

        for anchor in 0..layout.anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for channel in BOX_CHANNELS..layout.channels {
                let score = value(channel, anchor);
                if score > confidence {
                    confidence = score;
                    class_id = channel - BOX_CHANNELS;
                }
            }

            if confidence.is_nan() || confidence < self.params.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (
                value(0, anchor),
                value(1, anchor),
                value(2, anchor),
                value(3, anchor),
            );
            let (x1, y1, x2, y2) = cxcywh_to_xyxy(cx, cy, w, h);

            candidates.push(Prediction {
                class_id,
                confidence,
                bbox: [x1, y1, x2, y2],
            });
        }

        candidates
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    channels_first: bool,
    channels: usize,
    anchors: usize,
}

impl Layout {
    fn from_shape(shape: &[usize], num_classes: usize) -> Result<Self, DetectError> {
        let &[batch, rows, cols] = shape else {
            return Err(DetectError::MalformedOutput(format!(
                "expected 3 dimensions, got {:?}",
                shape
            )));
        };

        if batch != 1 {
            return Err(DetectError::MalformedOutput(format!(
                "expected batch size 1, got {}",
                batch
            )));
        }

        if num_classes == 0 {
            return Err(DetectError::MalformedOutput(
                "no class names configured".to_string(),
            ));
        }

        let channels = BOX_CHANNELS + num_classes;
        let (channels_first, anchors) = if rows == channels {
            (true, cols)
        } else if cols == channels {
            (false, rows)
        } else {
            return Err(DetectError::MalformedOutput(format!(
                "expected {} channels ({} classes) on axis 1 or 2, got {:?}",
                channels, num_classes, shape
            )));
        };

        Ok(Self {
            channels_first,
            channels,
            anchors,
        })
    }
}

/// Class-aware greedy NMS. Output is sorted by descending confidence and
/// truncated to `max_detections`.
pub fn non_max_suppression(
    mut candidates: Vec<Prediction>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Prediction> {
    // Stable sort keeps anchor order among equal scores
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Prediction> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }

        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);

        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

fn to_source_space(prediction: Prediction, transform: &LetterboxTransform) -> Option<Prediction> {
    let [x1, y1, x2, y2] = prediction.bbox;
    let (x1, y1) = transform.to_source(x1, y1);
    let (x2, y2) = transform.to_source(x2, y2);

    let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
    if !finite || x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Prediction {
        bbox: [x1, y1, x2, y2],
        ..prediction
    })
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
