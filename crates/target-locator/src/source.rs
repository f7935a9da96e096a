//! Frame sources.
//!
//! A [`FrameSource`] is owned exclusively by one pipeline for its whole
//! lifetime. `read` returning `None` is a capture failure and ends the
//! pipeline.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::RgbImage;
use log::{debug, error, info};

use crate::config::{CaptureSettings, ExposureMode};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no png/jpeg images found in {0}")]
    Empty(PathBuf),
}

pub trait FrameSource {
    /// Apply device settings. Best effort: the device may ignore any of them.
    fn configure(&mut self, _settings: &CaptureSettings) {}

    /// Capture the next frame.
    fn read(&mut self) -> Option<RgbImage>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn configure(&mut self, settings: &CaptureSettings) {
        (**self).configure(settings)
    }

    fn read(&mut self) -> Option<RgbImage> {
        (**self).read()
    }
}

fn describe(settings: &CaptureSettings) -> String {
    let exposure = match settings.exposure_mode {
        ExposureMode::Auto => "auto".to_string(),
        ExposureMode::Manual => format!("manual {}", settings.exposure),
    };
    format!("{}x{}, exposure {exposure}", settings.width, settings.height)
}

/// Replays image files from a directory in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, looping: bool) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        if paths.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        paths.sort();
        Ok(Self {
            paths,
            next: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn configure(&mut self, settings: &CaptureSettings) {
        info!(
            "replaying {} images ({}), ignoring capture settings {}",
            self.paths.len(),
            if self.looping { "looping" } else { "once" },
            describe(settings)
        );
    }

    fn read(&mut self) -> Option<RgbImage> {
        if self.next == self.paths.len() {
            if !self.looping {
                return None;
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        match image::open(path) {
            Ok(img) => {
                debug!("read {}", path.display());
                Some(img.to_rgb8())
            }
            Err(e) => {
                error!("failed to decode {}: {e}", path.display());
                None
            }
        }
    }
}

/// Serves frames held in memory.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    frames: Vec<RgbImage>,
    next: usize,
    looping: bool,
    settings: Option<CaptureSettings>,
}

impl ReplaySource {
    pub fn new(frames: Vec<RgbImage>, looping: bool) -> Self {
        Self {
            frames,
            next: 0,
            looping,
            settings: None,
        }
    }

    /// Settings received through [`FrameSource::configure`], if any.
    pub fn settings(&self) -> Option<&CaptureSettings> {
        self.settings.as_ref()
    }
}

impl FrameSource for ReplaySource {
    fn configure(&mut self, settings: &CaptureSettings) {
        debug!("replay source configured: {}", describe(settings));
        self.settings = Some(settings.clone());
    }

    fn read(&mut self) -> Option<RgbImage> {
        if self.next == self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.next = 0;
        }
        let frame = self.frames[self.next].clone();
        self.next += 1;
        Some(frame)
    }
}
