use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use livefakecheck_core::shared::constants::{
    APP_DIR_NAME, CLASSIFIER_MODEL_NAME, DEFAULT_CROP_MARGIN, DEFAULT_CROP_SIZE,
    DEFAULT_DETECTOR_CONFIDENCE, DEFAULT_FAKE_THRESHOLD, DEFAULT_PROBE_RANGE,
    DEFAULT_TICK_INTERVAL, DETECTOR_MODEL_NAME,
};
use livefakecheck_core::shared::region::DEFAULT_IOU_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera: u32,
    pub tick_interval_ms: u64,
    pub fake_threshold: f32,
    pub detector_confidence: f64,
    pub detector_iou: f64,
    pub crop_size: u32,
    pub crop_margin: f64,
    pub probe_range: u32,
    /// Path or http(s) URL of the face detector ONNX model.
    pub detector_model: String,
    /// Path or http(s) URL of the real/fake classifier ONNX model.
    pub classifier_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: 0,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            fake_threshold: DEFAULT_FAKE_THRESHOLD,
            detector_confidence: DEFAULT_DETECTOR_CONFIDENCE,
            detector_iou: DEFAULT_IOU_THRESHOLD,
            crop_size: DEFAULT_CROP_SIZE,
            crop_margin: DEFAULT_CROP_MARGIN,
            probe_range: DEFAULT_PROBE_RANGE,
            detector_model: DETECTOR_MODEL_NAME.to_string(),
            classifier_model: CLASSIFIER_MODEL_NAME.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reads settings from `path`, falling back to defaults if the file is
    /// missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings file {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.tick_interval_ms == 0 {
            return Err("Tick interval must be at least 1 ms".into());
        }
        if !(0.0..=1.0).contains(&self.fake_threshold) {
            return Err(format!(
                "Fake threshold must be between 0.0 and 1.0, got {}",
                self.fake_threshold
            )
            .into());
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.detector_confidence
            )
            .into());
        }
        if !(0.0..=1.0).contains(&self.detector_iou) {
            return Err(format!(
                "IoU threshold must be between 0.0 and 1.0, got {}",
                self.detector_iou
            )
            .into());
        }
        if self.crop_size == 0 {
            return Err("Crop size must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.crop_margin) {
            return Err(format!(
                "Crop margin must be between 0.0 and 1.0, got {}",
                self.crop_margin
            )
            .into());
        }
        if self.probe_range == 0 {
            return Err("Probe range must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.tick_interval(), Duration::from_millis(30));
        assert_eq!(s.crop_size, 380);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            camera: 2,
            fake_threshold: 0.65,
            classifier_model: "https://models.invalid/classifier.onnx".into(),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("absent.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "camera": 3 }"#).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.camera, 3);
        assert_eq!(loaded.probe_range, DEFAULT_PROBE_RANGE);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let zero_interval = Settings {
            tick_interval_ms: 0,
            ..Settings::default()
        };
        assert!(zero_interval.validate().is_err());

        let bad_threshold = Settings {
            fake_threshold: 1.5,
            ..Settings::default()
        };
        assert!(bad_threshold.validate().is_err());

        let zero_crop = Settings {
            crop_size: 0,
            ..Settings::default()
        };
        assert!(zero_crop.validate().is_err());
    }
}
