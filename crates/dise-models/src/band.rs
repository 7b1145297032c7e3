//! Obstruction severity bands for the gauge.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Background band of the gauge dial an obstruction percentage falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObstructionBand {
    /// 0-50
    Normal,
    /// 50-75
    Caution,
    /// 75-100
    Severe,
}

impl ObstructionBand {
    /// Classify an obstruction percentage. Values are clamped upstream to
    /// 0-100 by report validation.
    pub fn for_value(value: u8) -> Self {
        match value {
            0..=49 => ObstructionBand::Normal,
            50..=74 => ObstructionBand::Caution,
            _ => ObstructionBand::Severe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObstructionBand::Normal => "normal",
            ObstructionBand::Caution => "caution",
            ObstructionBand::Severe => "severe",
        }
    }

    /// Background color of this band on the dial.
    pub fn color(&self) -> &'static str {
        match self {
            ObstructionBand::Normal => "#EEF9E7",
            ObstructionBand::Caution => "#FFF4E5",
            ObstructionBand::Severe => "#FDECEC",
        }
    }

    /// Dial range covered by this band.
    pub fn range(&self) -> (u8, u8) {
        match self {
            ObstructionBand::Normal => (0, 50),
            ObstructionBand::Caution => (50, 75),
            ObstructionBand::Severe => (75, 100),
        }
    }
}

impl fmt::Display for ObstructionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
