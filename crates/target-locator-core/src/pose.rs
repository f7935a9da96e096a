//! Perspective-4-point pose estimation for a planar target.
//!
//! The solve runs in two stages:
//! 1. linear initialisation: undistort the corners, fit the plane→image
//!    homography and decompose it into `[r1 r2 t]`;
//! 2. Levenberg–Marquardt refinement of the full reprojection error
//!    (distortion included) over a rotation vector and translation.
//!
//! A solve that ends with points behind the camera or a reprojection RMS
//! above [`PoseParams::max_reprojection_px`] is reported as a failure.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::storage::Owned;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, SMatrix, SVector, Vector3, Vector6, U6, U8};
use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::homography::{homography_from_4pt, Homography};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Relative out-of-plane tolerance for the model points.
const COPLANAR_TOL: f64 = 1e-6;
const JACOBIAN_STEP: f64 = 1e-7;

/// Errors produced while building a [`PoseEstimator`] or solving a pose.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("target model points are degenerate (coincident or collinear)")]
    DegenerateModel,
    #[error("target model points are not coplanar (max offset {max_offset:.3e})")]
    NonCoplanarModel { max_offset: f64 },
    #[error("image corners are degenerate")]
    DegenerateCorners,
    #[error("solved pose places model point {index} behind the camera")]
    BehindCamera { index: usize },
    #[error("reprojection rms {rms_px:.2}px exceeds {max_px:.2}px")]
    ReprojectionTooLarge { rms_px: f64, max_px: f64 },
    #[error("pose solve produced non-finite values")]
    NonFinite,
    #[error("pose refinement failed: {reason}")]
    RefinementFailed { reason: &'static str },
}

/// Rigid transform mapping target-model coordinates into the camera frame:
/// `X_cam = R * X_model + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pose of the target as seen from a level camera placed at `position`
    /// (target frame) and turned `heading_deg` counter-clockwise about the
    /// vertical axis.
    ///
    /// Target frame: `x` out of the target face, `y` to the right of a viewer
    /// facing the target, `z` up. Heading `0` looks straight at the face
    /// (along `-x`).
    pub fn from_camera_placement(position: Vector3<f64>, heading_deg: f64) -> Self {
        let (s, c) = heading_deg.to_radians().sin_cos();
        let forward = Vector3::new(-c, -s, 0.0);
        let right = Vector3::new(-s, c, 0.0);
        let down = Vector3::new(0.0, 0.0, -1.0);
        let r = Matrix3::from_rows(&[right.transpose(), down.transpose(), forward.transpose()]);
        let mut rotation = Rotation3::from_matrix_unchecked(r);
        rotation.renormalize();
        let translation = -(rotation * position);
        Self::new(rotation, translation)
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }

    /// Camera origin expressed in the target frame: `Rᵗ · (−t)`.
    pub fn camera_position(&self) -> Vector3<f64> {
        self.rotation.inverse() * (-self.translation)
    }

    fn parameters(&self) -> Vector6<f64> {
        let r = self.rotation.scaled_axis();
        let t = self.translation;
        Vector6::new(r.x, r.y, r.z, t.x, t.y, t.z)
    }

    fn from_parameters(p: &Vector6<f64>) -> Self {
        Self::new(
            Rotation3::new(Vector3::new(p[0], p[1], p[2])),
            Vector3::new(p[3], p[4], p[5]),
        )
    }
}

/// Four 3D target points, ordered to match the corner extraction directions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 4]", into = "[[f64; 3]; 4]")]
pub struct TargetModel {
    pub points: [Point3<f64>; 4],
}

impl TargetModel {
    pub fn new(points: [Point3<f64>; 4]) -> Self {
        Self { points }
    }
}

impl From<[[f64; 3]; 4]> for TargetModel {
    fn from(points: [[f64; 3]; 4]) -> Self {
        Self::new(points.map(|[x, y, z]| Point3::new(x, y, z)))
    }
}

impl From<TargetModel> for [[f64; 3]; 4] {
    fn from(model: TargetModel) -> Self {
        model.points.map(|p| [p.x, p.y, p.z])
    }
}

/// Solver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Largest accepted RMS reprojection error of the 4 corners (pixels).
    pub max_reprojection_px: f64,
    /// Levenberg–Marquardt iteration cap.
    pub max_iterations: usize,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            max_reprojection_px: 4.0,
            max_iterations: 30,
        }
    }
}

/// Model points re-expressed in 2D coordinates of their own plane.
#[derive(Clone, Debug)]
struct ModelPlane {
    origin: Vector3<f64>,
    /// Columns: in-plane axes `e1`, `e2` and the normal.
    basis: Matrix3<f64>,
    points: [Point2<f64>; 4],
}

impl ModelPlane {
    fn fit(model: &TargetModel) -> Result<Self, PoseError> {
        let p = model.points.map(|p| p.coords);
        let origin = p.iter().fold(Vector3::<f64>::zeros(), |acc, q| acc + q) / 4.0;
        let extent = p.iter().map(|q| (q - origin).norm()).fold(0.0, f64::max);
        if !(extent > f64::EPSILON) {
            return Err(PoseError::DegenerateModel);
        }

        let normal = (p[2] - p[0]).cross(&(p[3] - p[1]));
        if normal.norm() <= 1e-9 * extent * extent {
            return Err(PoseError::DegenerateModel);
        }
        let normal = normal.normalize();

        let max_offset = p
            .iter()
            .map(|q| normal.dot(&(q - origin)).abs())
            .fold(0.0, f64::max);
        if max_offset > COPLANAR_TOL * extent {
            return Err(PoseError::NonCoplanarModel { max_offset });
        }

        let d = p[1] - p[0];
        let e1 = d - normal * normal.dot(&d);
        if e1.norm() <= f64::EPSILON {
            return Err(PoseError::DegenerateModel);
        }
        let e1 = e1.normalize();
        let e2 = normal.cross(&e1);
        let basis = Matrix3::from_columns(&[e1, e2, normal]);

        let points = p.map(|q| {
            let local = basis.transpose() * (q - origin);
            Point2::new(local.x, local.y)
        });

        Ok(Self {
            origin,
            basis,
            points,
        })
    }
}

/// Solves the target pose from its four extreme corners.
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    model: TargetModel,
    camera: CameraModel,
    params: PoseParams,
    plane: ModelPlane,
}

impl PoseEstimator {
    /// Fails when the model is not a proper planar quadrilateral.
    pub fn new(
        model: TargetModel,
        camera: CameraModel,
        params: PoseParams,
    ) -> Result<Self, PoseError> {
        let plane = ModelPlane::fit(&model)?;
        Ok(Self {
            model,
            camera,
            params,
            plane,
        })
    }

    pub fn model(&self) -> &TargetModel {
        &self.model
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Solve for the pose given pixel corners in model-point order.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn solve(&self, corners: &[Point2<f64>; 4]) -> Result<Pose, PoseError> {
        let normalized = corners.map(|px| self.camera.pixel_to_normalized(px));
        let h = homography_from_4pt(&self.plane.points, &normalized)
            .ok_or(PoseError::DegenerateCorners)?;
        let initial = self.pose_from_homography(&h)?;
        let pose = self.refine(initial, corners)?;
        self.check(&pose, corners)?;
        Ok(pose)
    }

    /// RMS pixel distance between projected model points and `corners`.
    pub fn reprojection_rms(&self, pose: &Pose, corners: &[Point2<f64>; 4]) -> Option<f64> {
        self.residuals(pose, corners)
            .map(|r| (r.norm_squared() / corners.len() as f64).sqrt())
    }

    fn pose_from_homography(&self, h: &Homography) -> Result<Pose, PoseError> {
        let h1 = h.h.column(0).into_owned();
        let h2 = h.h.column(1).into_owned();
        let h3 = h.h.column(2).into_owned();

        let scale = 0.5 * (h1.norm() + h2.norm());
        if !(scale > f64::EPSILON) {
            return Err(PoseError::DegenerateCorners);
        }
        let mut lambda = 1.0 / scale;
        // plane origin must land in front of the camera
        if h3.z < 0.0 {
            lambda = -lambda;
        }

        let r1 = h1 * lambda;
        let r2 = h2 * lambda;
        let approx = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

        // Project onto SO(3)
        let svd = approx.svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(PoseError::DegenerateCorners);
        };
        let mut r_plane = u * v_t;
        if r_plane.determinant() < 0.0 {
            let mut u_flipped = u;
            u_flipped.column_mut(2).neg_mut();
            r_plane = u_flipped * v_t;
        }
        let t_plane = h3 * lambda;

        let r = r_plane * self.plane.basis.transpose();
        let t = t_plane - r * self.plane.origin;
        if r.iter().chain(t.iter()).any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        Ok(Pose::new(Rotation3::from_matrix_unchecked(r), t))
    }

    fn residuals(&self, pose: &Pose, corners: &[Point2<f64>; 4]) -> Option<SVector<f64, 8>> {
        let mut r = SVector::<f64, 8>::zeros();
        for (i, (m, px)) in self.model.points.iter().zip(corners).enumerate() {
            let proj = self.camera.project(&pose.transform_point(m))?;
            r[2 * i] = proj.x - px.x;
            r[2 * i + 1] = proj.y - px.y;
        }
        Some(r)
    }

    fn jacobian(
        &self,
        params: &Vector6<f64>,
        corners: &[Point2<f64>; 4],
    ) -> Option<SMatrix<f64, 8, 6>> {
        let mut jac = SMatrix::<f64, 8, 6>::zeros();
        for k in 0..6 {
            let mut plus = *params;
            let mut minus = *params;
            plus[k] += JACOBIAN_STEP;
            minus[k] -= JACOBIAN_STEP;
            let rp = self.residuals(&Pose::from_parameters(&plus), corners)?;
            let rm = self.residuals(&Pose::from_parameters(&minus), corners)?;
            jac.set_column(k, &((rp - rm) / (2.0 * JACOBIAN_STEP)));
        }
        Some(jac)
    }

    fn refine(&self, initial: Pose, corners: &[Point2<f64>; 4]) -> Result<Pose, PoseError> {
        let problem = PoseProblem {
            estimator: self,
            corners,
            params: initial.parameters(),
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(self.params.max_iterations.max(1))
            .minimize(problem);
        match report.termination {
            TerminationReason::Numerical(reason) | TerminationReason::User(reason) => {
                Err(PoseError::RefinementFailed { reason })
            }
            reason => {
                if !reason.was_successful() {
                    debug!(
                        "pose refinement stopped after {} evaluations: {reason:?}",
                        report.number_of_evaluations
                    );
                }
                Ok(Pose::from_parameters(&problem.params))
            }
        }
    }

    fn check(&self, pose: &Pose, corners: &[Point2<f64>; 4]) -> Result<(), PoseError> {
        if pose
            .rotation
            .matrix()
            .iter()
            .chain(pose.translation.iter())
            .any(|v| !v.is_finite())
        {
            return Err(PoseError::NonFinite);
        }
        for (index, m) in self.model.points.iter().enumerate() {
            if pose.transform_point(m).z <= 0.0 {
                return Err(PoseError::BehindCamera { index });
            }
        }
        let rms_px = self
            .reprojection_rms(pose, corners)
            .ok_or(PoseError::NonFinite)?;
        if !rms_px.is_finite() {
            return Err(PoseError::NonFinite);
        }
        if rms_px > self.params.max_reprojection_px {
            return Err(PoseError::ReprojectionTooLarge {
                rms_px,
                max_px: self.params.max_reprojection_px,
            });
        }
        Ok(())
    }
}

/// Reprojection error of the four corners over `[rotation vector, translation]`.
struct PoseProblem<'a> {
    estimator: &'a PoseEstimator,
    corners: &'a [Point2<f64>; 4],
    params: Vector6<f64>,
}

impl LeastSquaresProblem<f64, U8, U6> for PoseProblem<'_> {
    type ResidualStorage = Owned<f64, U8>;
    type JacobianStorage = Owned<f64, U8, U6>;
    type ParameterStorage = Owned<f64, U6>;

    fn set_params(&mut self, x: &Vector6<f64>) {
        self.params = *x;
    }

    fn params(&self) -> Vector6<f64> {
        self.params
    }

    fn residuals(&self) -> Option<SVector<f64, 8>> {
        self.estimator
            .residuals(&Pose::from_parameters(&self.params), self.corners)
    }

    fn jacobian(&self) -> Option<SMatrix<f64, 8, 6>> {
        self.estimator.jacobian(&self.params, self.corners)
    }
}
