use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Locates faces in a frame.
///
/// Detection is a pure function of the frame: implementations keep no state
/// across calls beyond their loaded weights. `&mut self` is only there because
/// inference sessions need exclusive access while running.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
