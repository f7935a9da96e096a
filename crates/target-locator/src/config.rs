//! Static pipeline configuration, loaded once at startup.

use std::{fs, path::Path};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use target_locator_core::{
    CameraIntrinsics, CameraModel, Distortion, PoseError, PoseEstimator, PoseParams, TargetModel,
};
use target_locator_vision::{ContourParams, CornerParams, HsvBounds};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid target model: {0}")]
    Model(#[from] PoseError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    Auto,
    #[default]
    Manual,
}

/// Capture device settings, applied once when a pipeline starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub exposure_mode: ExposureMode,
    /// Device-specific absolute exposure value.
    pub exposure: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            exposure_mode: ExposureMode::Manual,
            exposure: 10.0,
            width: 640,
            height: 480,
        }
    }
}

/// Capacities of the two output channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelParams {
    pub target_capacity: usize,
    pub debug_capacity: usize,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            target_capacity: 4,
            debug_capacity: 2,
        }
    }
}

/// Default target: the outer corners of a trapezoidal tape outline on a
/// wall, meters, origin at the outline centre. Field frame: `x` out of the
/// wall, `y` to the right of a viewer facing it, `z` up.
pub fn default_target_model() -> TargetModel {
    TargetModel::new([
        Point3::new(0.0, -0.4985, 0.2159),
        Point3::new(0.0, 0.4985, 0.2159),
        Point3::new(0.0, 0.2493, -0.2159),
        Point3::new(0.0, -0.2493, -0.2159),
    ])
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub capture: CaptureSettings,
    pub segment: HsvBounds,
    pub contour: ContourParams,
    pub corners: CornerParams,
    pub target: TargetModel,
    pub camera: CameraModel,
    pub pose: PoseParams,
    /// Readings farther than this (horizontal distance, target units) are discarded.
    pub max_target_distance: f64,
    pub channels: ChannelParams,
    /// Per-frame diagnostics are logged every `debug_period` frames.
    pub debug_period: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            segment: HsvBounds::default(),
            contour: ContourParams::default(),
            corners: CornerParams::default(),
            target: default_target_model(),
            camera: CameraModel::new(
                CameraIntrinsics {
                    fx: 600.0,
                    fy: 600.0,
                    cx: 320.0,
                    cy: 240.0,
                },
                Distortion::default(),
            ),
            pose: PoseParams::default(),
            max_target_distance: 10.0,
            channels: ChannelParams::default(),
            debug_period: 30,
        }
    }
}

impl LocatorConfig {
    /// Load a JSON config from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let b = &self.segment;
        if (0..3).any(|c| b.low[c] > b.high[c]) {
            return invalid(format!("hsv low {:?} exceeds high {:?}", b.low, b.high));
        }

        let c = &self.contour;
        if !(c.min_area > 0.0) {
            return invalid(format!("contour.min_area must be > 0, got {}", c.min_area));
        }
        if !(c.max_fill_ratio > 0.0) {
            return invalid(format!(
                "contour.max_fill_ratio must be > 0, got {}",
                c.max_fill_ratio
            ));
        }
        if !(c.epsilon_frac > 0.0) {
            return invalid(format!(
                "contour.epsilon_frac must be > 0, got {}",
                c.epsilon_frac
            ));
        }
        if c.min_vertices < 3 || c.min_vertices > c.max_vertices {
            return invalid(format!(
                "contour vertex range {}..={} is empty or below 3",
                c.min_vertices, c.max_vertices
            ));
        }

        if let Some(i) = self
            .corners
            .directions
            .iter()
            .position(|[x, y]| !(x.hypot(*y) > 0.0))
        {
            return invalid(format!("corner direction {i} is zero or not finite"));
        }

        let k = &self.camera.intrinsics;
        if !(k.fx > 0.0 && k.fy > 0.0) {
            return invalid(format!("focal lengths must be > 0, got fx={} fy={}", k.fx, k.fy));
        }
        if !(self.pose.max_reprojection_px > 0.0) {
            return invalid(format!(
                "pose.max_reprojection_px must be > 0, got {}",
                self.pose.max_reprojection_px
            ));
        }
        if !(self.max_target_distance > 0.0) {
            return invalid(format!(
                "max_target_distance must be > 0, got {}",
                self.max_target_distance
            ));
        }
        if self.channels.target_capacity == 0 || self.channels.debug_capacity == 0 {
            return invalid("channel capacities must be at least 1".to_string());
        }
        if self.debug_period == 0 {
            return invalid("debug_period must be at least 1".to_string());
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid(format!(
                "capture size {}x{} is empty",
                self.capture.width, self.capture.height
            ));
        }

        PoseEstimator::new(self.target, self.camera, self.pose.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LocatorConfig::default().validate().expect("valid defaults");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "max_target_distance": 7.5,
            "contour": { "min_area": 300.0 },
            "capture": { "exposure_mode": "auto" }
        }"#;
        let cfg: LocatorConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(cfg.max_target_distance, 7.5);
        assert_eq!(cfg.contour.min_area, 300.0);
        assert_eq!(cfg.contour.max_vertices, 9);
        assert_eq!(cfg.capture.exposure_mode, ExposureMode::Auto);
        assert_eq!(cfg.capture.width, 640);
        assert_eq!(cfg.target, default_target_model());
        cfg.validate().expect("valid");
    }

    #[test]
    fn json_round_trip_via_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("locator.json");
        let mut cfg = LocatorConfig::default();
        cfg.debug_period = 5;
        cfg.camera.distortion.k1 = -0.1;
        cfg.write_json(&path).expect("write");
        let back = LocatorConfig::load_json(&path).expect("load");
        assert_eq!(back.debug_period, 5);
        assert_eq!(back.camera, cfg.camera);
        assert_eq!(back.target, cfg.target);
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = LocatorConfig::default();
        cfg.contour.min_vertices = 10;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = LocatorConfig::default();
        cfg.channels.target_capacity = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = LocatorConfig::default();
        cfg.corners.directions[2] = [0.0, 0.0];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = LocatorConfig::default();
        cfg.segment.low[0] = 120;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = LocatorConfig::default();
        cfg.max_target_distance = f64::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_bent_target_model() {
        let mut cfg = LocatorConfig::default();
        cfg.target.points[1].x = 0.3;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Model(PoseError::NonCoplanarModel { .. }))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LocatorConfig::load_json("/nonexistent/locator.json").expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
