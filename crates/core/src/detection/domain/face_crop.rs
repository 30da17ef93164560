use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use ndarray::ArrayView3;

use crate::shared::constants::{DEFAULT_CROP_MARGIN, DEFAULT_CROP_SIZE};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// How face boxes are turned into classifier input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropSettings {
    /// Output side length in pixels; crops are always square.
    pub size: u32,
    /// Context added around the box, as a fraction of its width/height per side.
    pub margin: f64,
}

pub const DEFAULT_CROP_SETTINGS: CropSettings = CropSettings {
    size: DEFAULT_CROP_SIZE,
    margin: DEFAULT_CROP_MARGIN,
};

/// A square RGB face crop (row-major, 8-bit) plus the frame box it came from.
#[derive(Clone, Debug)]
pub struct FaceCrop {
    pixels: Vec<u8>,
    size: u32,
    source: Region,
}

impl FaceCrop {
    pub fn new(pixels: Vec<u8>, size: u32, source: Region) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (size as usize) * (size as usize) * 3,
            "crop must hold size * size * 3 bytes"
        );
        Self {
            pixels,
            size,
            source,
        }
    }

    /// Cuts `region` (grown by the configured margin) out of an RGB frame and
    /// resizes it to `settings.size` square.
    ///
    /// Returns `Ok(None)` when the box lies entirely outside the frame.
    pub fn extract(
        frame: &Frame,
        region: &Region,
        settings: &CropSettings,
    ) -> Result<Option<FaceCrop>, Box<dyn std::error::Error>> {
        if !frame.is_well_formed() {
            return Err(format!(
                "cannot crop a malformed frame ({}x{}x{}, {} bytes)",
                frame.width(),
                frame.height(),
                frame.channels(),
                frame.data().len()
            )
            .into());
        }
        if settings.size == 0 {
            return Err("crop size must be positive".into());
        }
        let Some(bounds) = region.expand_clamped(settings.margin, frame.width(), frame.height())
        else {
            return Ok(None);
        };

        let view: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width(), frame.height(), frame.data())
                .ok_or("frame buffer does not match its dimensions")?;
        let cropped = imageops::crop_imm(
            &view,
            bounds.x as u32,
            bounds.y as u32,
            bounds.width as u32,
            bounds.height as u32,
        );
        let resized = imageops::resize(&*cropped, settings.size, settings.size, FilterType::Triangle);

        Ok(Some(FaceCrop::new(resized.into_raw(), settings.size, bounds)))
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The (margin-expanded, clamped) frame box this crop was cut from.
    pub fn source(&self) -> &Region {
        &self.source
    }

    /// Whether the pixel buffer matches the declared size.
    pub fn is_well_formed(&self) -> bool {
        self.size > 0 && self.pixels.len() == (self.size as usize).pow(2) * 3
    }

    /// (height, width, channel) view of the pixels.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        let s = self.size as usize;
        ArrayView3::from_shape((s, s, 3), &self.pixels).ok()
    }
}
