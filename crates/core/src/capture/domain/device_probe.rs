use crate::capture::domain::frame_source::FrameSourceFactory;

/// A camera that opened and produced a frame during probing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl CameraDevice {
    pub fn label(&self) -> String {
        format!("Camera {} ({}x{})", self.index, self.width, self.height)
    }
}

/// Finds usable cameras among device indices `0..range`.
///
/// A device counts only if it opens and yields one frame; the handle is
/// dropped again before moving to the next index.
pub fn probe_devices(factory: &dyn FrameSourceFactory, range: u32) -> Vec<CameraDevice> {
    let mut found = Vec::new();
    for index in 0..range {
        let mut source = match factory.open(index) {
            Ok(source) => source,
            Err(e) => {
                log::debug!("Probe: device {index} did not open: {e}");
                continue;
            }
        };
        match source.read() {
            Ok(frame) => found.push(CameraDevice {
                index,
                width: frame.width(),
                height: frame.height(),
            }),
            Err(e) => log::debug!("Probe: device {index} opened but gave no frame: {e}"),
        }
    }
    found
}
