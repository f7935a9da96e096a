//! Image-side stages of the target pipeline.
//!
//! - [`TargetSegmenter`]: RGB frame → HSV threshold mask.
//! - [`ContourSelector`]: mask → at most one good contour, rejecting
//!   ambiguous frames outright.
//! - [`CornerExtractor`]: good contour → 4 directional extreme points.
//! - [`annotate`]: debug overlays for the color frame.
//!
//! Frames are `image::RgbImage` (channel order R, G, B); masks are
//! `image::GrayImage` with 255 marking target-colored pixels.

pub mod annotate;
mod contour;
mod corners;
mod segment;

pub use contour::{
    approx_polygon_closed, ContourParams, ContourSelection, ContourSelector, GoodContour,
    SelectionReport,
};
pub use corners::{CornerExtractor, CornerParams, ExtremePoints};
pub use segment::{rgb_to_hsv, HsvBounds, TargetSegmenter};

/// Integer pixel point used for contours and polygons.
pub use imageproc::point::Point;
