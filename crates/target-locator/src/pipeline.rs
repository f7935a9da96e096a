//! The per-frame loop.
//!
//! Each iteration captures one frame, snapshots the yaw, locates the target
//! and publishes the outcome. Detection-quality problems become "no target"
//! readings; only capture failure and a vanished consumer end the loop.

use std::convert::Infallible;
use std::fmt;

use log::{debug, warn};
use target_locator_core::TargetReading;

use crate::config::CaptureSettings;
use crate::locator::{Detection, TargetLocator};
use crate::sink::{DebugFrame, DebugImage, DebugLabel, OutputSink, PublishOutcome};
use crate::source::FrameSource;
use crate::yaw::SharedYaw;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no frame (capture failed at frame {frame})")]
    NoFrame { frame: u64 },
    #[error("target channel closed by consumer")]
    TargetChannelClosed,
}

pub struct Pipeline<S> {
    source: S,
    locator: TargetLocator,
    sink: OutputSink,
    yaw: SharedYaw,
    debug_period: u64,
    frame_count: u64,
}

impl<S: FrameSource> Pipeline<S> {
    /// Takes ownership of `source` and applies `capture` to it.
    pub fn new(
        mut source: S,
        capture: &CaptureSettings,
        locator: TargetLocator,
        sink: OutputSink,
        yaw: SharedYaw,
        debug_period: u64,
    ) -> Self {
        source.configure(capture);
        Self {
            source,
            locator,
            sink,
            yaw,
            debug_period: debug_period.max(1),
            frame_count: 0,
        }
    }

    /// Frames captured so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Process frames until a fatal error.
    pub fn run(&mut self) -> Result<Infallible, PipelineError> {
        loop {
            self.step()?;
        }
    }

    /// Process exactly one frame.
    pub fn step(&mut self) -> Result<Detection, PipelineError> {
        self.frame_count += 1;
        let frame_index = self.frame_count;
        let frame = self
            .source
            .read()
            .ok_or(PipelineError::NoFrame { frame: frame_index })?;
        let yaw = self.yaw.get();

        let report = self.locator.locate(&frame, yaw);
        drop(frame);
        self.sink.publish_debug(DebugFrame {
            frame: frame_index,
            label: DebugLabel::Thresh,
            image: DebugImage::Mask(report.mask),
        });
        let annotated = DebugFrame {
            frame: frame_index,
            label: DebugLabel::Frame,
            image: DebugImage::Color(report.annotated),
        };

        if let Some(pose) = report.detection.pose() {
            let p = pose.camera_position();
            self.throttled(format_args!(
                "field_coord: {:7.2}{:7.2}{:7.2}",
                p.x, p.y, p.z
            ));
        }

        match &report.detection {
            Detection::NoContour | Detection::Ambiguous { .. } => {
                self.sink.publish_debug(annotated);
                self.throttled(format_args!("no good contour"));
                self.sink.publish_reading(TargetReading::NoTarget)?;
            }
            Detection::PoseFailed(e) => {
                self.throttled(format_args!("target not matched: {e}"));
                self.sink.publish_debug(annotated);
                self.sink.publish_reading(TargetReading::NoTarget)?;
            }
            Detection::TooFar { rejection, .. } => {
                warn!("{rejection}");
                self.sink.publish_reading(TargetReading::NoTarget)?;
            }
            Detection::Found { fix, .. } => {
                self.throttled(format_args!(
                    "distance {:5.2} toleft {:5.1} field_theta {:5.1}",
                    fix.distance, fix.bearing_left, fix.position.theta
                ));
                if self.sink.publish_reading(TargetReading::Found(*fix))? == PublishOutcome::Sent {
                    self.sink.publish_debug(annotated);
                }
            }
        }

        Ok(report.detection)
    }

    fn throttled(&self, args: fmt::Arguments<'_>) {
        if self.frame_count % self.debug_period == 0 {
            debug!("frame {}: {args}", self.frame_count);
        }
    }
}
