/// BlazeFace face localization using ONNX Runtime via `ort`.
///
/// Produces scored face boxes in frame coordinates; cropping and
/// normalization happen in the domain layer.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::DEFAULT_DETECTOR_CONFIDENCE;
use crate::shared::frame::Frame;
use crate::shared::onnx_session::load_session;
use crate::shared::region::{Region, DEFAULT_IOU_THRESHOLD};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

/// Detector thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub confidence: f64,
    pub iou_threshold: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_DETECTOR_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// BlazeFace detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    settings: DetectorSettings,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(
        model_path: &Path,
        settings: DetectorSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
            settings,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if !frame.is_well_formed() {
            return Err("BlazeFace needs a 3-channel frame".into());
        }

        let input = ort::value::Tensor::from_array(preprocess(frame, INPUT_SIZE))?;
        let outputs = self.session.run(ort::inputs![input])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.settings.confidence,
            frame.width(),
            frame.height(),
        );
        Ok(Region::deduplicate(&candidates, self.settings.iou_threshold))
    }
}

/// Resize frame to `size × size` (nearest neighbour) and scale to [0,1] NCHW.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Anchor-relative box decoding plus confidence filtering.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    frame_w: u32,
    frame_h: u32,
) -> Vec<Region> {
    let fw = frame_w as f32;
    let fh = frame_h as f32;
    let mut regions = Vec::new();

    for (i, (&raw_score, anchor)) in score_data.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = reg_data.get(offset..offset + 4) else {
            break;
        };

        let cx = anchor[0] + reg[0] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg[1] / INPUT_SIZE as f32;
        let w = reg[2] / INPUT_SIZE as f32;
        let h = reg[3] / INPUT_SIZE as f32;

        let x1 = ((cx - w / 2.0) * fw).max(0.0);
        let y1 = ((cy - h / 2.0) * fh).max(0.0);
        let x2 = ((cx + w / 2.0) * fw).min(fw);
        let y2 = ((cy + h / 2.0) * fh).min(fh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        regions.push(Region::new(
            x1 as i32,
            y1 as i32,
            (x2 - x1) as i32,
            (y2 - y1) as i32,
            score as f64,
        ));
    }
    regions
}

/// Short-range anchors: a 16×16 grid with 2 anchors per cell and an 8×8 grid
/// with 6 per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_shape_and_range() {
        let frame = Frame::rgb(vec![255u8; 200 * 100 * 3], 200, 100, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
        assert!((tensor[[0, 2, 64, 64]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 × 2 + 8×8 × 6 = 512 + 384
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert!(anchors
            .iter()
            .all(|a| a[0] > 0.0 && a[0] < 1.0 && a[1] > 0.0 && a[1] < 1.0));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_decode_filters_low_confidence() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        // Anchor 0: 64x64 box in model space centred on the anchor
        reg[2] = 64.0;
        reg[3] = 64.0;
        reg[REGRESSOR_STRIDE + 2] = 32.0;
        reg[REGRESSOR_STRIDE + 3] = 32.0;
        let scores = vec![5.0, -5.0];

        let regions = decode(&reg, &scores, &anchors, 0.7, 200, 100);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!((r.x, r.y, r.width, r.height), (50, 25, 100, 50));
        assert!(r.score > 0.99);
    }

    #[test]
    fn test_decode_skips_degenerate_boxes() {
        let anchors = vec![[0.5, 0.5]];
        let reg = vec![0.0f32; REGRESSOR_STRIDE];
        let regions = decode(&reg, &[5.0], &anchors, 0.5, 100, 100);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_default_settings() {
        let s = DetectorSettings::default();
        assert!((s.confidence - 0.7).abs() < f64::EPSILON);
        assert!((s.iou_threshold - 0.4).abs() < f64::EPSILON);
    }
}
