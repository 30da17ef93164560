use std::borrow::Cow;

use ndarray::ArrayView3;

/// Byte order of the three colour channels in a [`Frame`].
///
/// Capture backends differ in what they hand out; the tag travels with the
/// pixels so consumers can normalize at the point of use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A single captured camera frame: contiguous 8-bit pixels in row-major
/// (height, width, channel) order.
///
/// Frames are immutable once built. A tick owns its frame; the scheduler
/// takes its own copy so the source can move on to the next capture.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    order: ChannelOrder,
    index: usize,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        order: ChannelOrder,
        index: usize,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            order,
            index,
        }
    }

    /// Convenience constructor for 3-channel RGB frames.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        Self::new(data, width, height, 3, ChannelOrder::Rgb, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Sequence number assigned by the producing source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the buffer is a non-empty 3-channel image whose length matches
    /// its dimensions. Release builds skip the constructor assertion, so
    /// anything crossing a thread boundary is checked again here.
    pub fn is_well_formed(&self) -> bool {
        self.channels == 3
            && self.width > 0
            && self.height > 0
            && self.data.len()
                == (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Returns the frame in RGB order, borrowing when no swap is needed.
    pub fn to_rgb(&self) -> Cow<'_, Frame> {
        match self.order {
            ChannelOrder::Rgb => Cow::Borrowed(self),
            ChannelOrder::Bgr => {
                let mut data = self.data.clone();
                let step = self.channels.max(1) as usize;
                if step >= 3 {
                    for px in data.chunks_exact_mut(step) {
                        px.swap(0, 2);
                    }
                }
                Cow::Owned(Frame {
                    data,
                    order: ChannelOrder::Rgb,
                    ..*self
                })
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
