//! Warnings emitted when the target channel is full.
//!
//! Lives in its own test binary: it installs a process-wide logger.

use std::sync::Mutex;

use image::RgbImage;
use log::{Level, LevelFilter, Log, Metadata, Record};
use target_locator::{
    output_channels, ChannelParams, Detection, LocatorConfig, Pipeline, PublishOutcome,
    ReplaySource, SharedYaw, TargetLocator, TargetReading,
};

struct Capture(Mutex<Vec<(Level, String)>>);

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.0.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

fn drop_warnings() -> usize {
    CAPTURE
        .0
        .lock()
        .expect("capture lock")
        .iter()
        .filter(|(level, msg)| *level == Level::Warn && msg.contains("reading dropped"))
        .count()
}

#[test]
fn full_target_channel_logs_a_warning_per_drop() {
    log::set_logger(&CAPTURE).expect("first logger");
    log::set_max_level(LevelFilter::Trace);

    let params = ChannelParams {
        target_capacity: 1,
        debug_capacity: 1,
    };
    let (mut sink, rx) = output_channels(&params);
    assert_eq!(
        sink.publish_reading(TargetReading::NoTarget),
        Ok(PublishOutcome::Sent)
    );
    assert_eq!(drop_warnings(), 0);
    assert_eq!(
        sink.publish_reading(TargetReading::NoTarget),
        Ok(PublishOutcome::Dropped)
    );
    assert_eq!(drop_warnings(), 1);
    drop(rx);

    let mut cfg = LocatorConfig::default();
    cfg.channels = params;
    let (sink, _rx) = output_channels(&cfg.channels);
    let mut pipeline = Pipeline::new(
        ReplaySource::new(vec![RgbImage::new(64, 48); 3], false),
        &cfg.capture,
        TargetLocator::from_config(&cfg).expect("valid config"),
        sink,
        SharedYaw::default(),
        cfg.debug_period,
    );
    for _ in 0..3 {
        assert_eq!(pipeline.step(), Ok(Detection::NoContour));
    }
    assert_eq!(pipeline.sink().dropped_readings(), 2);
    assert_eq!(drop_warnings(), 3);
}
