//! Geometric core of the target localization pipeline.
//!
//! This crate knows nothing about images. It turns four ordered image-space
//! corners into a camera-relative [`Pose`] using a calibrated
//! [`CameraModel`] and a known planar [`TargetModel`], and converts that pose
//! into a robot-centric / field-absolute [`TargetReading`].
//!
//! ```
//! use nalgebra::{Point2, Point3};
//! use target_locator_core::{
//!     CameraIntrinsics, CameraModel, Distortion, PoseEstimator, PoseParams, TargetModel,
//! };
//!
//! let camera = CameraModel::new(
//!     CameraIntrinsics { fx: 600.0, fy: 600.0, cx: 320.0, cy: 240.0 },
//!     Distortion::default(),
//! );
//! let model = TargetModel::new([
//!     Point3::new(0.0, -0.5, 0.2),
//!     Point3::new(0.0, 0.5, 0.2),
//!     Point3::new(0.0, 0.25, -0.2),
//!     Point3::new(0.0, -0.25, -0.2),
//! ]);
//! let estimator = PoseEstimator::new(model, camera, PoseParams::default())?;
//! let corners = [
//!     Point2::new(220.0, 200.0),
//!     Point2::new(420.0, 200.0),
//!     Point2::new(370.0, 280.0),
//!     Point2::new(270.0, 280.0),
//! ];
//! let pose = estimator.solve(&corners)?;
//! assert!(pose.translation.z > 0.0);
//! # Ok::<(), target_locator_core::PoseError>(())
//! ```

mod camera;
mod field;
mod homography;
mod logger;
mod pose;
mod reading;

pub use camera::{CameraIntrinsics, CameraModel, Distortion};
pub use field::{FieldFix, FieldPosition, FieldTransformer, ImplausibleDistance};
pub use homography::{homography_from_4pt, Homography};
pub use pose::{Pose, PoseError, PoseEstimator, PoseParams, TargetModel};
pub use reading::{IncompleteReading, ReadingMessage, TargetReading};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
