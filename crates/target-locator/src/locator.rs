//! Single-frame detection: frame + yaw snapshot in, [`Detection`] out.
//!
//! [`TargetLocator`] holds only immutable configuration, so locating the
//! same frame with the same yaw always gives the same result.

use image::{GrayImage, RgbImage};
use target_locator_core::{
    FieldFix, FieldTransformer, ImplausibleDistance, Pose, PoseError, PoseEstimator, TargetReading,
};
use target_locator_vision::{
    annotate, ContourSelection, ContourSelector, CornerExtractor, ExtremePoints, TargetSegmenter,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, LocatorConfig};

/// What one frame yielded.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    /// No contour passed every gate.
    NoContour,
    /// Several contours passed every gate; all were discarded.
    Ambiguous { count: usize },
    PoseFailed(PoseError),
    /// A pose was found but lies beyond the plausible distance.
    TooFar {
        pose: Pose,
        rejection: ImplausibleDistance,
    },
    Found { pose: Pose, fix: FieldFix },
}

impl Detection {
    /// Reading to publish. Everything except [`Detection::Found`] is "no target".
    pub fn reading(&self) -> TargetReading {
        match self {
            Detection::Found { fix, .. } => TargetReading::Found(*fix),
            _ => TargetReading::NoTarget,
        }
    }

    pub fn pose(&self) -> Option<&Pose> {
        match self {
            Detection::TooFar { pose, .. } | Detection::Found { pose, .. } => Some(pose),
            _ => None,
        }
    }
}

/// Everything produced while locating one frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub detection: Detection,
    pub mask: GrayImage,
    /// Input frame with candidate polygons, the good contour and its corners drawn.
    pub annotated: RgbImage,
    pub corners: Option<ExtremePoints>,
}

#[derive(Clone, Debug)]
pub struct TargetLocator {
    segmenter: TargetSegmenter,
    selector: ContourSelector,
    extractor: CornerExtractor,
    estimator: PoseEstimator,
    transformer: FieldTransformer,
}

impl TargetLocator {
    pub fn new(
        segmenter: TargetSegmenter,
        selector: ContourSelector,
        extractor: CornerExtractor,
        estimator: PoseEstimator,
        transformer: FieldTransformer,
    ) -> Self {
        Self {
            segmenter,
            selector,
            extractor,
            estimator,
            transformer,
        }
    }

    /// Validate `config` and build every stage from it.
    pub fn from_config(config: &LocatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let estimator = PoseEstimator::new(config.target, config.camera, config.pose.clone())?;
        Ok(Self::new(
            TargetSegmenter::new(config.segment),
            ContourSelector::new(config.contour.clone()),
            CornerExtractor::new(config.corners.clone()),
            estimator,
            FieldTransformer::new(config.max_target_distance),
        ))
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn locate(&self, frame: &RgbImage, yaw_deg: f64) -> FrameReport {
        let mask = self.segmenter.segment(frame);
        let selection = self.selector.select(&mask);

        let mut annotated = frame.clone();
        annotate::draw_candidates(&mut annotated, &selection.candidate_polygons);

        let good = match selection.selection {
            ContourSelection::Good(good) => good,
            ContourSelection::NoContour => {
                return FrameReport {
                    detection: Detection::NoContour,
                    mask,
                    annotated,
                    corners: None,
                }
            }
            ContourSelection::Ambiguous { count } => {
                return FrameReport {
                    detection: Detection::Ambiguous { count },
                    mask,
                    annotated,
                    corners: None,
                }
            }
        };

        // a good contour is never empty
        let Some(corners) = self.extractor.extract(&good.points) else {
            return FrameReport {
                detection: Detection::NoContour,
                mask,
                annotated,
                corners: None,
            };
        };
        annotate::draw_target(&mut annotated, &good.points, &corners.points);

        let detection = match self.estimator.solve(&corners.points) {
            Err(e) => Detection::PoseFailed(e),
            Ok(pose) => match self.transformer.transform(&pose, yaw_deg) {
                Ok(fix) => Detection::Found { pose, fix },
                Err(rejection) => Detection::TooFar { pose, rejection },
            },
        };

        FrameReport {
            detection,
            mask,
            annotated,
            corners: Some(corners),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn locator() -> TargetLocator {
        TargetLocator::from_config(&LocatorConfig::default()).expect("valid config")
    }

    #[test]
    fn black_frame_finds_nothing() {
        let report = locator().locate(&RgbImage::new(320, 240), 0.0);
        assert_eq!(report.detection, Detection::NoContour);
        assert_eq!(report.detection.reading(), TargetReading::NoTarget);
        assert!(report.mask.pixels().all(|p| p.0[0] == 0));
        assert!(report.corners.is_none());
    }

    #[test]
    fn off_color_blob_is_ignored() {
        let mut frame = RgbImage::new(320, 240);
        for y in 50..150 {
            for x in 50..200 {
                frame.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let report = locator().locate(&frame, 0.0);
        assert_eq!(report.detection, Detection::NoContour);
        assert_eq!(report.annotated, frame);
    }

    #[test]
    fn only_found_carries_geometry() {
        assert!(!Detection::Ambiguous { count: 2 }.reading().found());
        assert!(!Detection::PoseFailed(PoseError::DegenerateCorners)
            .reading()
            .found());
        assert!(Detection::NoContour.pose().is_none());
    }
}
