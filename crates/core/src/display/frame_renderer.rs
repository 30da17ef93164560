use crate::capture::domain::frame_source::FrameSourceError;
use crate::inference::status::InferenceStatus;
use crate::shared::frame::Frame;

/// Presentation port: shows the live frame alongside the latest status.
///
/// Called on the display thread once per tick, so implementations must
/// return promptly.
pub trait FrameRenderer: Send {
    fn render(
        &mut self,
        frame: &Frame,
        status: &InferenceStatus,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Shows a transient capture problem in place of a frame.
    fn capture_issue(
        &mut self,
        error: &FrameSourceError,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
