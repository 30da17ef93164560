/// Binary real/fake face classifier using ONNX Runtime via `ort`.
///
/// Expects a model taking `[N, 3, S, S]` float input in [0, 1] and returning
/// `[N, 2]` logits ordered (real, fake).
use std::path::Path;

use crate::classification::domain::classifier::Classifier;
use crate::classification::domain::face_batch::FaceBatch;
use crate::shared::onnx_session::load_session;

/// Index of the "fake" class in the model output.
const FAKE_CLASS: usize = 1;

pub struct OnnxClassifier {
    session: ort::session::Session,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let input = ort::value::Tensor::from_array(batch.view().to_owned())?;
        let outputs = self.session.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("classifier model produced no outputs".into());
        }
        let logits = outputs[0].try_extract_array::<f32>()?;
        let shape = logits.shape().to_vec();
        if shape.len() != 2 || shape[1] <= FAKE_CLASS {
            return Err(format!("unexpected classifier output shape: {shape:?}").into());
        }
        let data = logits.as_slice().ok_or("Cannot get logits slice")?;

        Ok(data
            .chunks_exact(shape[1])
            .map(|row| softmax(row)[FAKE_CLASS])
            .collect())
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}
