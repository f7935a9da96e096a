//! Synthetic frames of the target for tests, benches and the CLI.
//!
//! The target is drawn as a U-shaped band inside the quadrilateral spanned
//! by the four model points (top-left, top-right, bottom-right, bottom-left):
//! two side strips joined by a bottom strip, open at the top. Its outer
//! corners are exactly the model points.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use nalgebra::Point3;
use target_locator_core::{CameraModel, Pose, TargetModel};

/// Pure green; inside the default HSV bounds.
pub const TARGET_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Side strip width as a fraction of the quadrilateral width.
const SIDE_FRAC: f64 = 0.15;
/// Depth of the open notch as a fraction of the quadrilateral height.
const NOTCH_FRAC: f64 = 0.8;

fn lerp(a: &Point3<f64>, b: &Point3<f64>, t: f64) -> Point3<f64> {
    a + (b - a) * t
}

/// Bilinear point of the model quadrilateral: `s` runs left→right, `r` top→bottom.
fn quad_point(model: &TargetModel, s: f64, r: f64) -> Point3<f64> {
    let [tl, tr, br, bl] = &model.points;
    let top = lerp(tl, tr, s);
    let bottom = lerp(bl, br, s);
    lerp(&top, &bottom, r)
}

/// The 8 vertices of the band outline, in model coordinates.
pub fn band_outline(model: &TargetModel) -> [Point3<f64>; 8] {
    [
        quad_point(model, 0.0, 0.0),
        quad_point(model, SIDE_FRAC, 0.0),
        quad_point(model, SIDE_FRAC, NOTCH_FRAC),
        quad_point(model, 1.0 - SIDE_FRAC, NOTCH_FRAC),
        quad_point(model, 1.0 - SIDE_FRAC, 0.0),
        quad_point(model, 1.0, 0.0),
        quad_point(model, 1.0, 1.0),
        quad_point(model, 0.0, 1.0),
    ]
}

/// Draw the target seen from `pose` onto `frame`.
///
/// Returns `false` (and draws nothing) when any vertex is behind the camera.
pub fn draw_target(frame: &mut RgbImage, camera: &CameraModel, model: &TargetModel, pose: &Pose) -> bool {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(8);
    for v in band_outline(model) {
        let Some(px) = camera.project(&pose.transform_point(&v)) else {
            return false;
        };
        let p = Point::new(px.x.round() as i32, px.y.round() as i32);
        if polygon.last() != Some(&p) {
            polygon.push(p);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() < 3 {
        return false;
    }
    draw_polygon_mut(frame, &polygon, TARGET_COLOR);
    true
}

/// A black `width`×`height` frame with the target drawn at `pose`.
pub fn render_target(
    camera: &CameraModel,
    model: &TargetModel,
    pose: &Pose,
    width: u32,
    height: u32,
) -> RgbImage {
    let mut frame = RgbImage::new(width, height);
    draw_target(&mut frame, camera, model, pose);
    frame
}
