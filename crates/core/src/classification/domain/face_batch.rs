use ndarray::{s, Array4, ArrayView4};

use crate::detection::domain::face_crop::FaceCrop;

/// Face crops stacked into one `[N, 3, size, size]` tensor with pixel values
/// scaled from `0..=255` to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct FaceBatch {
    tensor: Array4<f32>,
}

impl FaceBatch {
    /// Normalizes and stacks `crops` channel-first.
    ///
    /// Fails if the batch is empty, a crop's buffer does not match its size,
    /// or the crops disagree on size.
    pub fn from_crops(crops: &[FaceCrop]) -> Result<Self, String> {
        let first = crops.first().ok_or("cannot build a batch from zero crops")?;
        let size = first.size() as usize;

        let mut tensor = Array4::<f32>::zeros((crops.len(), 3, size, size));
        for (n, crop) in crops.iter().enumerate() {
            if crop.size() as usize != size {
                return Err(format!(
                    "crop {n} is {}px but the batch is {size}px",
                    crop.size()
                ));
            }
            let pixels = crop
                .as_ndarray()
                .filter(|_| crop.is_well_formed())
                .ok_or_else(|| format!("crop {n} has a malformed pixel buffer"))?;
            let mut dst = tensor.slice_mut(s![n, .., .., ..]);
            for ((y, x, c), &v) in pixels.indexed_iter() {
                dst[[c, y, x]] = v as f32 / 255.0;
            }
        }
        Ok(Self { tensor })
    }

    pub fn len(&self) -> usize {
        self.tensor.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.tensor.view()
    }
}
