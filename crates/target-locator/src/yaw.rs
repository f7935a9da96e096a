use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Robot yaw in degrees, written by an external estimator and read once per
/// frame by the pipeline.
///
/// Stored as the bit pattern of an `f64` so reads never tear.
#[derive(Clone, Debug, Default)]
pub struct SharedYaw(Arc<AtomicU64>);

impl SharedYaw {
    pub fn new(degrees: f64) -> Self {
        Self(Arc::new(AtomicU64::new(degrees.to_bits())))
    }

    pub fn set(&self, degrees: f64) {
        self.0.store(degrees.to_bits(), Ordering::Relaxed);
    }

    /// Snapshot of the latest value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}
