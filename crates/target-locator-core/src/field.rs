//! Camera-relative pose → robot bearing and field position.
//!
//! Robot convention: `x` forward, `y` left, `z` up. The camera looks along
//! robot forward, so forward = `t_z`, left = `-t_x`, up = `-t_y` of the
//! target translation in the camera frame.

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Position and heading in the field (target-model) frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub theta: f64,
}

/// A plausible target localization for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldFix {
    /// Horizontal distance camera→target, same unit as the target model.
    pub distance: f64,
    /// Signed horizontal angle from robot forward to the target, degrees, left positive.
    pub bearing_left: f64,
    /// `bearing_left` plus the external yaw snapshot, degrees.
    pub field_azimuth: f64,
    pub position: FieldPosition,
}

/// Rejection from the distance sanity gate.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("target distance {distance:.2} exceeds plausible maximum {max:.2}")]
pub struct ImplausibleDistance {
    pub distance: f64,
    pub max: f64,
}

/// Converts a solved pose into a [`FieldFix`], rejecting physically
/// impossible distances.
#[derive(Clone, Copy, Debug)]
pub struct FieldTransformer {
    max_target_distance: f64,
}

impl FieldTransformer {
    pub fn new(max_target_distance: f64) -> Self {
        Self {
            max_target_distance,
        }
    }

    pub fn max_target_distance(&self) -> f64 {
        self.max_target_distance
    }

    /// `yaw_deg` is the external yaw snapshot taken when the frame was captured.
    pub fn transform(&self, pose: &Pose, yaw_deg: f64) -> Result<FieldFix, ImplausibleDistance> {
        let field = pose.camera_position();
        let distance = field.x.hypot(field.y);
        // NaN must not pass the gate
        if !(distance <= self.max_target_distance) {
            return Err(ImplausibleDistance {
                distance,
                max: self.max_target_distance,
            });
        }

        let bearing_left = bearing_left_deg(pose);
        let theta = field.y.atan2(field.x).to_degrees() - 180.0 - bearing_left;

        Ok(FieldFix {
            distance,
            bearing_left,
            field_azimuth: bearing_left + yaw_deg,
            position: FieldPosition {
                x: field.x,
                y: field.y,
                theta,
            },
        })
    }
}

fn bearing_left_deg(pose: &Pose) -> f64 {
    let t = pose.translation;
    let forward = t.z;
    let left = -t.x;
    left.atan2(forward).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    #[test]
    fn centred_target_has_zero_bearing() {
        let pose = Pose::from_camera_placement(Vector3::new(4.0, 0.0, -0.5), 0.0);
        let fix = FieldTransformer::new(10.0)
            .transform(&pose, 0.0)
            .expect("plausible");
        assert_abs_diff_eq!(fix.bearing_left, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fix.distance, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fix.position.x, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fix.position.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_camera_sees_target_to_the_left() {
        // camera to the viewer's right of the target, looking straight at the wall
        let pose = Pose::from_camera_placement(Vector3::new(3.0, 0.5, -0.3), 0.0);
        let fix = FieldTransformer::new(10.0)
            .transform(&pose, 0.0)
            .expect("plausible");
        assert_abs_diff_eq!(fix.bearing_left, 0.5_f64.atan2(3.0).to_degrees(), epsilon = 1e-9);
        assert_abs_diff_eq!(fix.distance, 3.0_f64.hypot(0.5), epsilon = 1e-9);
    }

    #[test]
    fn field_theta_tracks_camera_heading() {
        for heading in [-25.0, 0.0, 10.0, 30.0] {
            let pose = Pose::from_camera_placement(Vector3::new(3.5, -0.8, -0.4), heading);
            let fix = FieldTransformer::new(10.0)
                .transform(&pose, 0.0)
                .expect("plausible");
            let phi = (-0.8_f64).atan2(3.5).to_degrees();
            assert_abs_diff_eq!(fix.bearing_left, phi - heading, epsilon = 1e-9);
            assert_abs_diff_eq!(fix.position.theta, heading - 180.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn azimuth_adds_yaw_snapshot() {
        let pose = Pose::from_camera_placement(Vector3::new(3.0, 0.5, -0.3), 5.0);
        let t = FieldTransformer::new(10.0);
        let a = t.transform(&pose, 0.0).expect("plausible");
        let b = t.transform(&pose, 42.5).expect("plausible");
        assert_abs_diff_eq!(b.field_azimuth - a.field_azimuth, 42.5, epsilon = 1e-12);
        assert_eq!(a.bearing_left, b.bearing_left);
    }

    #[test]
    fn distance_gate_rejects_far_targets() {
        let pose = Pose::from_camera_placement(Vector3::new(12.0, 1.0, -0.3), 0.0);
        let err = FieldTransformer::new(10.0)
            .transform(&pose, 0.0)
            .expect_err("too far");
        assert_abs_diff_eq!(err.distance, 12.0_f64.hypot(1.0), epsilon = 1e-9);
        assert_eq!(err.max, 10.0);
    }

    #[test]
    fn distance_gate_rejects_nan() {
        let mut pose = Pose::from_camera_placement(Vector3::new(3.0, 0.0, 0.0), 0.0);
        pose.translation.x = f64::NAN;
        assert!(FieldTransformer::new(10.0).transform(&pose, 0.0).is_err());
    }
}
