use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("camera {device} is unavailable: {reason}")]
    DeviceUnavailable { device: u32, reason: String },
    /// No frame this tick. Transient: the next read may succeed.
    #[error("no frame available")]
    EndOfStream,
    #[error("failed to decode camera frame: {0}")]
    Decode(String),
}

impl FrameSourceError {
    /// Short label for the presentation layer.
    pub fn status_text(&self) -> &'static str {
        match self {
            FrameSourceError::DeviceUnavailable { .. } => "Camera unavailable",
            FrameSourceError::EndOfStream => "Waiting for frame",
            FrameSourceError::Decode(_) => "Camera frame unreadable",
        }
    }
}

/// Produces camera frames on demand.
///
/// One `read` per display tick. Implementations own the device handle and
/// release it on drop.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Frame, FrameSourceError>;
}

/// Opens a frame source for a device index.
pub trait FrameSourceFactory {
    fn open(&self, device: u32) -> Result<Box<dyn FrameSource>, FrameSourceError>;
}

impl<F> FrameSourceFactory for F
where
    F: Fn(u32) -> Result<Box<dyn FrameSource>, FrameSourceError>,
{
    fn open(&self, device: u32) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        self(device)
    }
}
