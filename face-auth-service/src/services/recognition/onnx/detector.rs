//! SCRFD face detection.

use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::cmp::Ordering;
use std::path::Path;

use super::super::{FaceImage, RecognitionError};

const INPUT_SIDE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_SCALE: f32 = 128.0;
const NMS_IOU: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Placement of the source frame inside the square model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    offset_x: usize,
    offset_y: usize,
}

impl Letterbox {
    fn for_frame(width: u32, height: u32) -> Self {
        let scale = (INPUT_SIDE as f32 / width as f32).min(INPUT_SIDE as f32 / height as f32);
        let (w, h) = Self::scaled(width, height, scale);
        Self {
            scale,
            offset_x: (INPUT_SIDE - w) / 2,
            offset_y: (INPUT_SIDE - h) / 2,
        }
    }

    fn scaled(width: u32, height: u32, scale: f32) -> (usize, usize) {
        let w = ((width as f32 * scale).round() as usize).clamp(1, INPUT_SIDE);
        let h = ((height as f32 * scale).round() as usize).clamp(1, INPUT_SIDE);
        (w, h)
    }

    fn to_frame(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        )
    }
}

/// Output slots `(score, bbox, keypoints)` for each stride.
type StrideSlots = [(usize, usize, usize); 3];

pub struct FaceDetector {
    session: Session,
    slots: StrideSlots,
    min_confidence: f32,
}

impl FaceDetector {
    pub fn load(model_path: &Path, min_confidence: f32) -> Result<Self, RecognitionError> {
        if !model_path.exists() {
            return Err(RecognitionError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 9 {
            return Err(RecognitionError::InferenceFailed(format!(
                "detector must expose 9 outputs, found {}",
                names.len()
            )));
        }

        let slots = output_slots(&names);
        tracing::info!(path = %model_path.display(), outputs = ?names, ?slots, "Loaded face detector");

        Ok(Self {
            session,
            slots,
            min_confidence,
        })
    }

    /// Faces in `image`, most confident first.
    pub fn detect(&mut self, image: &FaceImage) -> Result<Vec<Detection>, RecognitionError> {
        let (input, letterbox) = preprocess(image)?;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in self.slots.iter().zip(STRIDES.iter()) {
            let (score_idx, bbox_idx, kps_idx) = *slot;
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        RecognitionError::InferenceFailed(format!("{} at stride {}: {}", what, stride, e))
                    })
            };
            let scores = extract(score_idx, "scores")?;
            let boxes = extract(bbox_idx, "boxes")?;
            let keypoints = extract(kps_idx, "keypoints")?;

            candidates.extend(decode_stride(
                scores,
                boxes,
                keypoints,
                stride,
                &letterbox,
                self.min_confidence,
            ));
        }

        Ok(suppress(candidates, NMS_IOU))
    }
}

fn preprocess(image: &FaceImage) -> Result<(Array4<f32>, Letterbox), RecognitionError> {
    let rgb = image
        .to_rgb()
        .ok_or_else(|| RecognitionError::InvalidImage("pixel buffer size mismatch".to_string()))?;
    let letterbox = Letterbox::for_frame(image.width, image.height);
    let (w, h) = Letterbox::scaled(image.width, image.height, letterbox.scale);
    let resized = imageops::resize(&rgb, w as u32, h as u32, FilterType::Triangle);

    // Padding stays at zero, which is the normalized mean.
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIDE, INPUT_SIDE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (ty, tx) = (y as usize + letterbox.offset_y, x as usize + letterbox.offset_x);
        for (channel, value) in pixel.0.iter().enumerate() {
            tensor[[0, channel, ty, tx]] = (*value as f32 - PIXEL_MEAN) / PIXEL_SCALE;
        }
    }

    Ok((tensor, letterbox))
}

/// Map each stride to its score/bbox/keypoint outputs, by name when the export
/// uses `score_8`-style names and by position otherwise.
fn output_slots(names: &[String]) -> StrideSlots {
    let position = |prefix: &str, stride: usize| {
        let wanted = format!("{}_{}", prefix, stride);
        names.iter().position(|n| *n == wanted)
    };

    let mut by_name = [(0, 0, 0); 3];
    for (i, &stride) in STRIDES.iter().enumerate() {
        match (
            position("score", stride),
            position("bbox", stride),
            position("kps", stride),
        ) {
            (Some(s), Some(b), Some(k)) => by_name[i] = (s, b, k),
            _ => return [(0, 3, 6), (1, 4, 7), (2, 5, 8)],
        }
    }
    by_name
}

fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    keypoints: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    min_confidence: f32,
) -> Vec<Detection> {
    let cells_per_row = INPUT_SIDE / stride;
    let anchors = cells_per_row * cells_per_row * ANCHORS_PER_CELL;
    let step = stride as f32;

    (0..anchors.min(scores.len()))
        .filter(|&i| scores[i] >= min_confidence)
        .filter_map(|i| {
            let bbox = boxes.get(i * 4..i * 4 + 4)?;
            let cell = i / ANCHORS_PER_CELL;
            let cx = (cell % cells_per_row) as f32 * step;
            let cy = (cell / cells_per_row) as f32 * step;

            let (x1, y1) = letterbox.to_frame((cx - bbox[0] * step, cy - bbox[1] * step));
            let (x2, y2) = letterbox.to_frame((cx + bbox[2] * step, cy + bbox[3] * step));

            let landmarks = keypoints.get(i * 10..i * 10 + 10).map(|kps| {
                std::array::from_fn(|p| {
                    letterbox.to_frame((cx + kps[p * 2] * step, cy + kps[p * 2 + 1] * step))
                })
            });

            Some(Detection {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: scores[i],
                landmarks,
            })
        })
        .collect()
}

fn by_confidence(a: &Detection, b: &Detection) -> Ordering {
    b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal)
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn suppress(mut candidates: Vec<Detection>, max_iou: f32) -> Vec<Detection> {
    candidates.sort_by(by_confidence);
    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate) <= max_iou) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let overlap_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let overlap_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let intersection = overlap_w * overlap_h;
    let union = a.width * a.height + b.width * b.height - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, side: f32, confidence: f32) -> Detection {
        Detection {
            x,
            y,
            width: side,
            height: side,
            confidence,
            landmarks: None,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = det(0.0, 0.0, 10.0, 1.0);
        let b = Detection { x: 5.0, ..det(0.0, 0.0, 10.0, 1.0) };
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(iou(&a, &det(50.0, 50.0, 10.0, 1.0)), 0.0);
    }

    #[test]
    fn suppression_keeps_best_of_overlapping_boxes() {
        let kept = suppress(
            vec![
                det(5.0, 5.0, 100.0, 0.8),
                det(300.0, 300.0, 40.0, 0.6),
                det(0.0, 0.0, 100.0, 0.95),
            ],
            NMS_IOU,
        );
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.95, 0.6]);
    }

    #[test]
    fn named_outputs_are_mapped_by_name() {
        let slots = output_slots(&names(&[
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]));
        assert_eq!(slots, [(2, 0, 1), (5, 3, 4), (8, 6, 7)]);
    }

    #[test]
    fn anonymous_outputs_fall_back_to_position() {
        let slots = output_slots(&names(&["448", "471", "494", "451", "474", "497", "454", "477", "500"]));
        assert_eq!(slots, [(0, 3, 6), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn letterbox_centres_wide_frames() {
        let lb = Letterbox::for_frame(320, 160);
        assert_eq!(lb.scale, 2.0);
        assert_eq!((lb.offset_x, lb.offset_y), (0, 160));
        let (x, y) = lb.to_frame((200.0, 260.0));
        assert_eq!((x, y), (100.0, 50.0));
    }

    #[test]
    fn decode_maps_anchor_back_to_frame() {
        let lb = Letterbox { scale: 1.0, offset_x: 0, offset_y: 0 };
        let cells = INPUT_SIDE / 32;
        let anchors = cells * cells * ANCHORS_PER_CELL;
        let mut scores = vec![0.0; anchors];
        let mut boxes = vec![0.0; anchors * 4];
        let keypoints = vec![0.0; anchors * 10];

        // Second anchor of cell (1, 0).
        let idx = 3;
        scores[idx] = 0.9;
        boxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 0.0, 1.0, 2.0]);

        let found = decode_stride(&scores, &boxes, &keypoints, 32, &lb, 0.5);
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!((d.x, d.y, d.width, d.height), (0.0, 0.0, 64.0, 64.0));
        assert_eq!(d.landmarks, Some([(32.0, 0.0); 5]));
    }

    #[test]
    fn preprocess_places_frame_inside_padding() {
        let image = FaceImage { width: 64, height: 32, pixels: [255, 0, 127].repeat(64 * 32) };
        let (tensor, lb) = preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, INPUT_SIDE, INPUT_SIDE]);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        let (y, x) = (lb.offset_y + 5, 5);
        assert!((tensor[[0, 0, y, x]] - (255.0 - PIXEL_MEAN) / PIXEL_SCALE).abs() < 1e-6);
        assert!((tensor[[0, 1, y, x]] - (0.0 - PIXEL_MEAN) / PIXEL_SCALE).abs() < 1e-6);
        assert!((tensor[[0, 2, y, x]] - (127.0 - PIXEL_MEAN) / PIXEL_SCALE).abs() < 1e-6);
    }
}
