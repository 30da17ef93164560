use crate::capture::domain::frame_source::{FrameSource, FrameSourceError};
use crate::shared::frame::{ChannelOrder, Frame};

/// Live camera capture via libavdevice (v4l2 / avfoundation / dshow).
///
/// Decoded frames are converted to packed RGB24 and tagged accordingly.
pub struct FfmpegCamera {
    device: u32,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<ScalerSlot>,
    stream_index: usize,
    frame_index: usize,
}

struct ScalerSlot {
    key: (ffmpeg_next::format::Pixel, u32, u32),
    context: ffmpeg_next::software::scaling::Context,
}

// Safety: FfmpegCamera is owned by a single display loop at a time.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    /// Opens camera `device` with the platform capture backend.
    pub fn open(device: u32) -> Result<Self, FrameSourceError> {
        let unavailable = |reason: String| FrameSourceError::DeviceUnavailable { device, reason };

        ffmpeg_next::init().map_err(|e| unavailable(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let (backend, path) = device_input(device);
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == backend)
            .map(ffmpeg_next::format::Format::Input)
            .ok_or_else(|| unavailable(format!("capture backend '{backend}' not available")))?;

        // Non-blocking reads: a tick with no frame ready returns EAGAIN
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("fflags", "nonblock");
        let ictx = ffmpeg_next::format::open_with(&path, &format, options)
            .map_err(|e| unavailable(e.to_string()))?
            .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| unavailable("no video stream".into()))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| unavailable(e.to_string()))?;

        log::debug!(
            "Opened camera {device} via {backend} ({}x{})",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            device,
            ictx,
            decoder,
            scaler: None,
            stream_index,
            frame_index: 0,
        })
    }

    /// Factory usable with [`crate::capture::domain::device_probe::probe_devices`].
    pub fn open_boxed(device: u32) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        Ok(Box::new(Self::open(device)?))
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let width = decoded.width();
        let height = decoded.height();
        let key = (decoded.format(), width, height);
        if self.scaler.as_ref().map_or(true, |s| s.key != key) {
            let context = ffmpeg_next::software::scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| FrameSourceError::Decode(e.to_string()))?;
            self.scaler = Some(ScalerSlot { key, context });
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Some(slot) = self.scaler.as_mut() {
            slot.context
                .run(&decoded, &mut rgb)
                .map_err(|e| FrameSourceError::Decode(e.to_string()))?;
        }

        let pixels = strip_row_padding(rgb.data(0), rgb.stride(0), width, height);
        let frame = Frame::new(pixels, width, height, 3, ChannelOrder::Rgb, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

impl FrameSource for FfmpegCamera {
    fn read(&mut self) -> Result<Frame, FrameSourceError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            if let Err(e) = packet.read(&mut self.ictx) {
                return Err(read_error(self.device, e));
            }

            if packet.stream() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|e| FrameSourceError::Decode(e.to_string()))?;
        }
    }
}

/// Maps a packet read failure. "Try again" and end-of-file both mean no frame
/// this tick; anything else is a device fault.
fn read_error(device: u32, error: ffmpeg_next::Error) -> FrameSourceError {
    match error {
        ffmpeg_next::Error::Eof => FrameSourceError::EndOfStream,
        ffmpeg_next::Error::Other { errno } if errno == ffmpeg_next::util::error::EAGAIN => {
            FrameSourceError::EndOfStream
        }
        e => FrameSourceError::DeviceUnavailable {
            device,
            reason: e.to_string(),
        },
    }
}

/// Capture backend name and device URL for a camera index.
fn device_input(device: u32) -> (&'static str, String) {
    #[cfg(target_os = "macos")]
    {
        ("avfoundation", format!("{device}:none"))
    }
    #[cfg(target_os = "windows")]
    {
        // TODO: dshow addresses cameras by friendly name; map indices through
        // the dshow device list instead of relying on numeric names.
        ("dshow", format!("video={device}"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ("video4linux2,v4l2", format!("/dev/video{device}"))
    }
}

/// Copies a padded ffmpeg plane into a tightly packed RGB buffer.
///
/// Rows may carry padding bytes past `width * 3` (stride > width*3).
fn strip_row_padding(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
