//! Real-time single-target localization.
//!
//! Each frame goes through the same straight pipeline:
//! HSV threshold → contour gating and disambiguation → directional extreme
//! corners → planar PnP → field transform → bounded, non-blocking output.
//!
//! ## Quickstart
//!
//! ```
//! use target_locator::{LocatorConfig, TargetLocator};
//! use target_locator::synthetic::render_target;
//! use target_locator::core::Pose;
//! use nalgebra::Vector3;
//!
//! let config = LocatorConfig::default();
//! let locator = TargetLocator::from_config(&config)?;
//!
//! let truth = Pose::from_camera_placement(Vector3::new(3.0, 0.4, -0.3), 0.0);
//! let frame = render_target(&config.camera, &config.target, &truth, 640, 480);
//!
//! let reading = locator.locate(&frame, 0.0).detection.reading();
//! assert!(reading.found());
//! # Ok::<(), target_locator::ConfigError>(())
//! ```
//!
//! ## API map
//! - [`TargetLocator`]: one frame in, one [`Detection`] out, no hidden state.
//! - [`Pipeline`]: capture loop around a [`FrameSource`], [`OutputSink`] and [`SharedYaw`].
//! - [`supervisor`]: runs a pipeline in an isolated thread and reports its [`ProcessExit`].
//! - `target_locator::core` / `target_locator::vision`: the underlying crates.

pub use target_locator_core as core;
pub use target_locator_vision as vision;

mod config;
mod locator;
mod pipeline;
mod sink;
mod source;
pub mod supervisor;
pub mod synthetic;
mod yaw;

pub use config::{
    default_target_model, CaptureSettings, ChannelParams, ConfigError, ExposureMode, LocatorConfig,
};
pub use locator::{Detection, FrameReport, TargetLocator};
pub use pipeline::{Pipeline, PipelineError};
pub use sink::{
    output_channels, DebugFrame, DebugImage, DebugLabel, OutputReceivers, OutputSink,
    PublishOutcome,
};
pub use source::{FrameSource, ImageSequenceSource, ReplaySource, SourceError};
pub use supervisor::{ProcessExit, ProcessHandle, RestartPolicy};
pub use yaw::SharedYaw;

pub use target_locator_core::{FieldFix, FieldPosition, ReadingMessage, TargetReading};
