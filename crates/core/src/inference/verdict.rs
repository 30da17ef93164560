use std::fmt;
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Real,
    Fake,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Real => write!(f, "REAL"),
            Label::Fake => write!(f, "FAKE"),
        }
    }
}

/// Frame-level verdict of one completed inference job.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceResult {
    pub label: Label,
    /// Aggregated fakeness in [0, 1].
    pub confidence: f32,
    pub timestamp: SystemTime,
    /// Number of faces that contributed to the verdict.
    pub faces: usize,
}

impl InferenceResult {
    /// Builds a verdict from per-face scores using [`aggregate_max`] and the
    /// given threshold. `None` when there are no scores.
    pub fn from_scores(scores: &[f32], threshold: f32) -> Option<Self> {
        let confidence = aggregate_max(scores)?;
        Some(Self {
            label: label_for(confidence, threshold),
            confidence,
            timestamp: SystemTime::now(),
            faces: scores.len(),
        })
    }
}

/// The frame is as fake as its most convincing fake face.
pub fn aggregate_max(scores: &[f32]) -> Option<f32> {
    scores.iter().copied().reduce(f32::max)
}

/// FAKE only when `score` is strictly above `threshold`.
pub fn label_for(score: f32, threshold: f32) -> Label {
    if score > threshold {
        Label::Fake
    } else {
        Label::Real
    }
}
