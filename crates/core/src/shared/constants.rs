use std::time::Duration;

/// Display tick period (~33 fps cap).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(30);

/// A frame is FAKE only when its aggregated fakeness is strictly above this.
pub const DEFAULT_FAKE_THRESHOLD: f32 = 0.5;

/// Number of camera indices tried when enumerating devices.
pub const DEFAULT_PROBE_RANGE: u32 = 10;

/// Minimum detector confidence for a face box to be kept.
pub const DEFAULT_DETECTOR_CONFIDENCE: f64 = 0.7;

/// Side length of the square crops fed to the classifier.
pub const DEFAULT_CROP_SIZE: u32 = 380;

/// Extra context kept around each face box, as a fraction of its size per side.
pub const DEFAULT_CROP_MARGIN: f64 = 0.25;

pub const DETECTOR_MODEL_NAME: &str = "face_detector.onnx";
pub const CLASSIFIER_MODEL_NAME: &str = "deepfake_classifier.onnx";

/// Directory name used under the platform cache/config directories.
pub const APP_DIR_NAME: &str = "LiveFakeCheck";
