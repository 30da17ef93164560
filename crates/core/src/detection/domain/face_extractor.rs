use crate::detection::domain::face_crop::{CropSettings, FaceCrop};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// Turns a frame into zero or more fixed-size face crops ready for
/// classification. An empty result means no face was found.
pub trait FaceExtractor: Send {
    fn extract(&mut self, frame: &Frame) -> Result<Vec<FaceCrop>, Box<dyn std::error::Error>>;
}

/// [`FaceExtractor`] that runs a [`FaceDetector`] and crops every box it
/// reports, in detector order.
pub struct CroppingFaceExtractor {
    detector: Box<dyn FaceDetector>,
    settings: CropSettings,
}

impl CroppingFaceExtractor {
    pub fn new(detector: Box<dyn FaceDetector>, settings: CropSettings) -> Self {
        Self { detector, settings }
    }
}

impl FaceExtractor for CroppingFaceExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<Vec<FaceCrop>, Box<dyn std::error::Error>> {
        let rgb = frame.to_rgb();
        let regions = self.detector.detect(&rgb)?;
        let mut crops = Vec::with_capacity(regions.len());
        for region in &regions {
            match FaceCrop::extract(&rgb, region, &self.settings)? {
                Some(crop) => crops.push(crop),
                None => log::debug!("Dropping face box outside frame: {region:?}"),
            }
        }
        Ok(crops)
    }
}
