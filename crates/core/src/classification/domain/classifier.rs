use crate::classification::domain::face_batch::FaceBatch;

/// Scores a batch of face crops for fakeness.
///
/// Must return exactly one score in [0, 1] per crop, in batch order. The
/// caller verifies both and treats a violation as a classification failure.
pub trait Classifier: Send {
    fn classify(&mut self, batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
