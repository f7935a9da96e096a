//! Pinhole camera with Brown–Conrady distortion (`k1, k2, p1, p2, k3`).
//!
//! Pixel coordinates follow the usual image convention: `x` to the right,
//! `y` down, camera looking along `+z`.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

const UNDISTORT_ITERS: usize = 10;

/// Pinhole intrinsics (zero skew).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// The 3×3 intrinsic matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Build from a row-major `K` matrix. Skew is ignored.
    pub fn from_matrix(k: [[f64; 3]; 3]) -> Self {
        Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[0][2],
            cy: k[1][2],
        }
    }
}

/// Radial (`k1, k2, k3`) and tangential (`p1, p2`) distortion coefficients,
/// in the same order as the common 5-coefficient calibration output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_coefficients(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }

    /// Apply distortion to an ideal normalized image point.
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, p: Point2<f64>) -> Point2<f64> {
        if self.is_zero() {
            return p;
        }
        let (xd, yd) = (p.x, p.y);
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        Point2::new(x, y)
    }
}

/// Calibrated camera: intrinsics plus lens distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a camera-frame point to pixels. `None` for points at or
    /// behind the image plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        let d = self.distortion.distort(Point2::new(p.x / p.z, p.y / p.z));
        let k = &self.intrinsics;
        Some(Point2::new(k.fx * d.x + k.cx, k.fy * d.y + k.cy))
    }

    /// Map a pixel to an undistorted normalized image point (`z = 1` plane).
    pub fn pixel_to_normalized(&self, px: Point2<f64>) -> Point2<f64> {
        let k = &self.intrinsics;
        let d = Point2::new((px.x - k.cx) / k.fx, (px.y - k.cy) / k.fy);
        self.distortion.undistort(d)
    }
}
