//! Per-axis configuration from TOML.

use serde::Deserialize;

use super::units::{MmPerSec, MmPerSecSquared};
use crate::motion::NUM_AXES;

/// Configuration of one linear axis.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Motor steps (including microstepping) per millimeter of travel.
    pub steps_per_mm: f32,

    /// Maximum travel speed of this axis in mm/s.
    #[serde(rename = "max_rate_mm_per_sec")]
    pub max_rate: MmPerSec,

    /// Maximum acceleration of this axis in mm/s².
    #[serde(rename = "acceleration_mm_per_sec2")]
    pub acceleration: MmPerSecSquared,
}

impl AxisConfig {
    /// Create a new axis configuration.
    pub fn new(steps_per_mm: f32, max_rate: MmPerSec, acceleration: MmPerSecSquared) -> Self {
        Self {
            steps_per_mm,
            max_rate,
            acceleration,
        }
    }
}

/// The three machine axes.
#[derive(Debug, Clone, Deserialize)]
pub struct AxesConfig {
    /// X axis.
    pub x: AxisConfig,
    /// Y axis.
    pub y: AxisConfig,
    /// Z axis.
    pub z: AxisConfig,
}

impl AxesConfig {
    /// Use the same settings on every axis.
    pub fn uniform(axis: AxisConfig) -> Self {
        Self {
            x: axis.clone(),
            y: axis.clone(),
            z: axis,
        }
    }

    /// Axes in index order (X = 0).
    pub fn as_array(&self) -> [&AxisConfig; NUM_AXES] {
        [&self.x, &self.y, &self.z]
    }
}
