//! Debug overlays drawn onto the color frame.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::point::Point;
use nalgebra::Point2;

/// Polygon approximations of candidate contours.
pub const CANDIDATE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Extreme points of the good contour.
pub const CORNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub const CANDIDATE_THICKNESS: u32 = 3;
pub const CORNER_RADIUS: i32 = 4;

/// Draw a closed polyline, `thickness` pixels wide.
pub fn draw_closed_outline(frame: &mut RgbImage, outline: &[Point<i32>], thickness: u32, color: Rgb<u8>) {
    if outline.is_empty() {
        return;
    }
    let half = (thickness.max(1) as i32 - 1) / 2;
    let extra = (thickness.max(1) as i32 - 1) - half;
    for (a, b) in outline.iter().zip(outline.iter().cycle().skip(1)) {
        for ox in -half..=extra {
            for oy in -half..=extra {
                draw_line_segment_mut(
                    frame,
                    ((a.x + ox) as f32, (a.y + oy) as f32),
                    ((b.x + ox) as f32, (b.y + oy) as f32),
                    color,
                );
            }
        }
    }
}

/// Draw candidate polygons in [`CANDIDATE_COLOR`].
pub fn draw_candidates(frame: &mut RgbImage, polygons: &[Vec<Point<i32>>]) {
    for polygon in polygons {
        draw_closed_outline(frame, polygon, CANDIDATE_THICKNESS, CANDIDATE_COLOR);
    }
}

/// Outline the good contour (1 px) and mark its corners with filled dots.
pub fn draw_target(frame: &mut RgbImage, contour: &[Point<i32>], corners: &[Point2<f64>; 4]) {
    draw_closed_outline(frame, contour, 1, CANDIDATE_COLOR);
    for c in corners {
        draw_filled_circle_mut(
            frame,
            (c.x.round() as i32, c.y.round() as i32),
            CORNER_RADIUS,
            CORNER_COLOR,
        );
    }
}
