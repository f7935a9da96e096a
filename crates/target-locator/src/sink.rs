//! Non-blocking publication of readings and debug images.
//!
//! Both channels are bounded and never block the pipeline. A full target
//! channel drops the reading with a warning; a full debug channel drops the
//! image silently.

use std::fmt;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use image::{GrayImage, RgbImage};
use log::warn;
use target_locator_core::TargetReading;

use crate::config::ChannelParams;
use crate::pipeline::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugLabel {
    /// Threshold mask.
    Thresh,
    /// Annotated color frame.
    Frame,
}

impl DebugLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            DebugLabel::Thresh => "thresh",
            DebugLabel::Frame => "frame",
        }
    }
}

impl fmt::Display for DebugLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DebugImage {
    Mask(GrayImage),
    Color(RgbImage),
}

impl DebugImage {
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> image::ImageResult<()> {
        match self {
            DebugImage::Mask(img) => img.save(path),
            DebugImage::Color(img) => img.save(path),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DebugFrame {
    /// Index of the frame that produced this image (first frame is 1).
    pub frame: u64,
    pub label: DebugLabel,
    pub image: DebugImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    Dropped,
}

/// Producer side of the target and debug channels.
#[derive(Debug)]
pub struct OutputSink {
    target: SyncSender<TargetReading>,
    debug: SyncSender<DebugFrame>,
    dropped_readings: u64,
}

impl OutputSink {
    pub fn new(target: SyncSender<TargetReading>, debug: SyncSender<DebugFrame>) -> Self {
        Self {
            target,
            debug,
            dropped_readings: 0,
        }
    }

    /// Offer a reading without blocking.
    ///
    /// A disconnected target channel means the consumer is gone; that is
    /// reported as an error and ends the pipeline.
    pub fn publish_reading(
        &mut self,
        reading: TargetReading,
    ) -> Result<PublishOutcome, PipelineError> {
        match self.target.try_send(reading) {
            Ok(()) => Ok(PublishOutcome::Sent),
            Err(TrySendError::Full(_)) => {
                self.dropped_readings += 1;
                warn!(
                    "target channel full, reading dropped ({} so far)",
                    self.dropped_readings
                );
                Ok(PublishOutcome::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::TargetChannelClosed),
        }
    }

    /// Offer a debug image without blocking. Drops are silent.
    pub fn publish_debug(&self, frame: DebugFrame) -> PublishOutcome {
        match self.debug.try_send(frame) {
            Ok(()) => PublishOutcome::Sent,
            Err(_) => PublishOutcome::Dropped,
        }
    }

    pub fn dropped_readings(&self) -> u64 {
        self.dropped_readings
    }
}

/// Consumer ends matching an [`OutputSink`].
#[derive(Debug)]
pub struct OutputReceivers {
    pub readings: Receiver<TargetReading>,
    pub debug: Receiver<DebugFrame>,
}

/// Create both bounded channels and the sink feeding them.
pub fn output_channels(params: &ChannelParams) -> (OutputSink, OutputReceivers) {
    let (target_tx, target_rx) = sync_channel(params.target_capacity);
    let (debug_tx, debug_rx) = sync_channel(params.debug_capacity);
    (
        OutputSink::new(target_tx, debug_tx),
        OutputReceivers {
            readings: target_rx,
            debug: debug_rx,
        },
    )
}
