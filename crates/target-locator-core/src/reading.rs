use serde::{Deserialize, Serialize};

use crate::field::{FieldFix, FieldPosition};

/// Wire form of a reading on the target channel.
///
/// When `found` is false every other field is `None`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingMessage {
    pub found: bool,
    pub distance: Option<f64>,
    pub bearing_left: Option<f64>,
    pub field_azimuth: Option<f64>,
    /// `[x, y, theta_deg]`
    pub field_position: Option<[f64; 3]>,
}

/// Per-frame output of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReadingMessage", try_from = "ReadingMessage")]
pub enum TargetReading {
    NoTarget,
    Found(FieldFix),
}

impl TargetReading {
    pub fn found(&self) -> bool {
        matches!(self, TargetReading::Found(_))
    }

    pub fn fix(&self) -> Option<&FieldFix> {
        match self {
            TargetReading::Found(fix) => Some(fix),
            TargetReading::NoTarget => None,
        }
    }

    pub fn distance(&self) -> Option<f64> {
        self.fix().map(|f| f.distance)
    }

    pub fn bearing_left(&self) -> Option<f64> {
        self.fix().map(|f| f.bearing_left)
    }

    pub fn field_azimuth(&self) -> Option<f64> {
        self.fix().map(|f| f.field_azimuth)
    }

    pub fn field_position(&self) -> Option<FieldPosition> {
        self.fix().map(|f| f.position)
    }
}

impl From<TargetReading> for ReadingMessage {
    fn from(reading: TargetReading) -> Self {
        match reading {
            TargetReading::NoTarget => ReadingMessage {
                found: false,
                distance: None,
                bearing_left: None,
                field_azimuth: None,
                field_position: None,
            },
            TargetReading::Found(fix) => ReadingMessage {
                found: true,
                distance: Some(fix.distance),
                bearing_left: Some(fix.bearing_left),
                field_azimuth: Some(fix.field_azimuth),
                field_position: Some([fix.position.x, fix.position.y, fix.position.theta]),
            },
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("reading marked found but `{0}` is missing")]
pub struct IncompleteReading(pub &'static str);

impl TryFrom<ReadingMessage> for TargetReading {
    type Error = IncompleteReading;

    fn try_from(msg: ReadingMessage) -> Result<Self, Self::Error> {
        if !msg.found {
            return Ok(TargetReading::NoTarget);
        }
        let distance = msg.distance.ok_or(IncompleteReading("distance"))?;
        let bearing_left = msg.bearing_left.ok_or(IncompleteReading("bearing_left"))?;
        let field_azimuth = msg.field_azimuth.ok_or(IncompleteReading("field_azimuth"))?;
        let [x, y, theta] = msg
            .field_position
            .ok_or(IncompleteReading("field_position"))?;
        Ok(TargetReading::Found(FieldFix {
            distance,
            bearing_left,
            field_azimuth,
            position: FieldPosition { x, y, theta },
        }))
    }
}
