//! Unit types for physical quantities.
//!
//! Per-axis speed and acceleration limits carry their unit in the type so the
//! TOML keys and the planner cannot mix them up.

use serde::Deserialize;

/// Linear speed in millimeters per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec(pub f32);

/// Linear acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSecSquared(pub f32);
