//! Directional-extremity corner extraction.

use imageproc::point::Point;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four direction vectors in image coordinates (`x` right, `y` down).
///
/// The order of the directions is the order of the extracted corners and
/// must match the order of the target model points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerParams {
    pub directions: [[f64; 2]; 4],
}

impl Default for CornerParams {
    fn default() -> Self {
        // top-left, top-right, bottom-right, bottom-left
        Self {
            directions: [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
        }
    }
}

/// The 4 extreme contour points, in direction order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtremePoints {
    pub points: [Point2<f64>; 4],
    /// Index of each point in the source contour.
    pub indices: [usize; 4],
}

#[derive(Clone, Debug)]
pub struct CornerExtractor {
    params: CornerParams,
}

impl CornerExtractor {
    pub fn new(params: CornerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CornerParams {
        &self.params
    }

    /// For each direction, the contour point with the largest projection.
    ///
    /// Ties go to the first point in contour order. Returns `None` only for an
    /// empty contour.
    pub fn extract(&self, contour: &[Point<i32>]) -> Option<ExtremePoints> {
        if contour.is_empty() {
            return None;
        }
        let indices = self.params.directions.map(|[dx, dy]| {
            let mut best = 0;
            let mut best_score = f64::NEG_INFINITY;
            for (i, p) in contour.iter().enumerate() {
                let score = dx * f64::from(p.x) + dy * f64::from(p.y);
                if score > best_score {
                    best = i;
                    best_score = score;
                }
            }
            best
        });
        let points = indices.map(|i| Point2::new(f64::from(contour[i].x), f64::from(contour[i].y)));
        Some(ExtremePoints { points, indices })
    }
}
