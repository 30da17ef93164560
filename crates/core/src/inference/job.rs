use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::classification::domain::classifier::Classifier;
use crate::classification::domain::face_batch::FaceBatch;
use crate::detection::domain::face_extractor::FaceExtractor;
use crate::inference::error::InferenceError;
use crate::inference::inference_logger::InferenceLogger;
use crate::inference::status::InferenceStatus;
use crate::inference::verdict::InferenceResult;
use crate::shared::frame::Frame;

/// The two-stage pipeline run for one frame: extract faces, classify them,
/// aggregate into a frame verdict.
pub struct InferenceJob {
    extractor: Box<dyn FaceExtractor>,
    classifier: Box<dyn Classifier>,
    fake_threshold: f32,
}

impl InferenceJob {
    pub fn new(
        extractor: Box<dyn FaceExtractor>,
        classifier: Box<dyn Classifier>,
        fake_threshold: f32,
    ) -> Self {
        Self {
            extractor,
            classifier,
            fake_threshold,
        }
    }

    /// Runs both stages on `frame`.
    ///
    /// Returns [`InferenceStatus::NoFace`] or [`InferenceStatus::Verdict`];
    /// every collaborator failure comes back as an [`InferenceError`].
    pub fn run(
        &mut self,
        frame: &Frame,
        logger: &mut dyn InferenceLogger,
    ) -> Result<InferenceStatus, InferenceError> {
        if !frame.is_well_formed() {
            return Err(InferenceError::MalformedFrame(format!(
                "{}x{}x{} with {} bytes",
                frame.width(),
                frame.height(),
                frame.channels(),
                frame.data().len()
            )));
        }

        let started = Instant::now();
        let crops = self
            .extractor
            .extract(frame)
            .map_err(|e| InferenceError::Extraction(e.to_string()))?;
        logger.timing("extract", elapsed_ms(started));

        if crops.is_empty() {
            return Ok(InferenceStatus::NoFace);
        }

        let batch = FaceBatch::from_crops(&crops).map_err(InferenceError::MalformedCrop)?;

        let started = Instant::now();
        let scores = self
            .classifier
            .classify(&batch)
            .map_err(|e| InferenceError::Classification(e.to_string()))?;
        logger.timing("classify", elapsed_ms(started));

        if scores.len() != crops.len() {
            return Err(InferenceError::ClassifierArity {
                expected: crops.len(),
                got: scores.len(),
            });
        }
        if let Some((index, &score)) = scores
            .iter()
            .enumerate()
            .find(|(_, s)| !(0.0..=1.0).contains(*s))
        {
            return Err(InferenceError::ScoreOutOfRange { index, score });
        }

        InferenceResult::from_scores(&scores, self.fake_threshold)
            .map(InferenceStatus::Verdict)
            .ok_or(InferenceError::ClassifierArity {
                expected: crops.len(),
                got: 0,
            })
    }

    /// Like [`InferenceJob::run`], but never fails: errors and panics from
    /// either stage become [`InferenceStatus::Error`].
    pub fn run_to_status(
        &mut self,
        frame: &Frame,
        logger: &mut dyn InferenceLogger,
    ) -> InferenceStatus {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(frame, logger)));
        let error = match outcome {
            Ok(Ok(status)) => return status,
            Ok(Err(e)) => e,
            Err(payload) => InferenceError::Panicked(panic_message(payload.as_ref())),
        };
        log::warn!("Inference error on frame {}: {error}", frame.index());
        InferenceStatus::Error(error)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
