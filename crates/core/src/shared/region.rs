/// Default IoU above which two face boxes are considered the same face.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.4;

/// An axis-aligned face bounding box in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector confidence in [0, 1].
    pub score: f64,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    /// Greedy non-maximum suppression: visits regions by descending score and
    /// keeps one only if its IoU with every kept region is at or below the
    /// threshold.
    pub fn deduplicate(regions: &[Region], iou_threshold: f64) -> Vec<Region> {
        let mut sorted = regions.to_vec();
        sorted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept: Vec<Region> = Vec::with_capacity(sorted.len());
        for r in sorted {
            let dominated = kept.iter().any(|k| r.iou(k) > iou_threshold);
            if !dominated {
                kept.push(r);
            }
        }
        kept
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        inter / (area_a + area_b - inter)
    }

    /// Grows the box by `margin` times its own width/height on every side,
    /// then clamps it to a `frame_w × frame_h` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn expand_clamped(&self, margin: f64, frame_w: u32, frame_h: u32) -> Option<Region> {
        let dx = (self.width as f64 * margin) as i32;
        let dy = (self.height as f64 * margin) as i32;
        let x1 = (self.x - dx).max(0);
        let y1 = (self.y - dy).max(0);
        let x2 = (self.x + self.width + dx).min(frame_w as i32);
        let y2 = (self.y + self.height + dy).min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        })
    }
}
