//! HSV color thresholding.
//!
//! HSV values use the 8-bit convention of common vision libraries:
//! `H ∈ [0, 180)` (degrees / 2), `S, V ∈ [0, 255]`, so bounds tuned on
//! such tools carry over unchanged.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Inclusive per-channel HSV bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBounds {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl Default for HsvBounds {
    fn default() -> Self {
        // green LED ring on retro-reflective tape
        Self {
            low: [50, 100, 60],
            high: [90, 255, 255],
        }
    }
}

impl HsvBounds {
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.low[c] <= hsv[c] && hsv[c] <= self.high[c])
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(i32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 { 0 } else { (255 * diff + v / 2) / v };

    let h = if diff == 0 {
        0.0
    } else {
        let d = diff as f32;
        let h = if v == r {
            60.0 * (g - b) as f32 / d
        } else if v == g {
            120.0 + 60.0 * (b - r) as f32 / d
        } else {
            240.0 + 60.0 * (r - g) as f32 / d
        };
        if h < 0.0 {
            h + 360.0
        } else {
            h
        }
    };
    let h = (h / 2.0).round() as i32 % 180;

    [h as u8, s as u8, v as u8]
}

/// Thresholds frames into target masks.
#[derive(Clone, Debug)]
pub struct TargetSegmenter {
    bounds: HsvBounds,
}

impl TargetSegmenter {
    pub fn new(bounds: HsvBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &HsvBounds {
        &self.bounds
    }

    /// 255 where the pixel's HSV value lies inside the bounds, 0 elsewhere.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn segment(&self, frame: &RgbImage) -> GrayImage {
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let hsv = rgb_to_hsv(frame.get_pixel(x, y).0);
            Luma([if self.bounds.contains(hsv) { 255 } else { 0 }])
        })
    }
}
