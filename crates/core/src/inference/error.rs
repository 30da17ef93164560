use thiserror::Error;

/// Why an inference job ended without a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("frame is malformed: {0}")]
    MalformedFrame(String),
    #[error("face extraction failed: {0}")]
    Extraction(String),
    #[error("face crop is malformed: {0}")]
    MalformedCrop(String),
    #[error("classification failed: {0}")]
    Classification(String),
    #[error("classifier returned {got} scores for {expected} faces")]
    ClassifierArity { expected: usize, got: usize },
    #[error("classifier score {score} for face {index} is outside [0, 1]")]
    ScoreOutOfRange { index: usize, score: f32 },
    #[error("inference panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to spawn inference worker: {0}")]
    Spawn(#[source] std::io::Error),
}
