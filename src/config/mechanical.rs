//! Mechanical constraints derived from machine configuration.

use super::machine::MachineConfig;
use crate::motion::NUM_AXES;

/// Derived planning parameters computed from the machine configuration.
///
/// These are computed once at initialization and used for all motion planning.
#[derive(Debug, Clone)]
pub struct MechanicalConstraints {
    /// Steps per millimeter, per axis.
    pub steps_per_mm: [f32; NUM_AXES],

    /// Maximum axis speed in mm/s.
    pub max_rate: [f32; NUM_AXES],

    /// Maximum axis acceleration in mm/s².
    pub acceleration: [f32; NUM_AXES],

    /// Corner deviation used by the junction speed bound, in mm.
    pub junction_deviation: f32,

    /// Junction speed across a reversal, in mm/s.
    pub minimum_planner_speed: f32,

    /// Floor for the initial and final pulse rate of a block, in steps/s.
    pub minimum_step_rate: f32,

    /// Fastest lead-axis pulse rate the step interrupt can produce (one step per tick).
    pub max_step_rate: f32,
}

impl MechanicalConstraints {
    /// Compute mechanical constraints from machine configuration.
    pub fn from_config(config: &MachineConfig) -> Self {
        let axes = config.axes.as_array();

        Self {
            steps_per_mm: axes.map(|a| a.steps_per_mm),
            max_rate: axes.map(|a| a.max_rate.0),
            acceleration: axes.map(|a| a.acceleration.0),
            junction_deviation: config.planner.junction_deviation_mm,
            minimum_planner_speed: config.planner.minimum_planner_speed,
            minimum_step_rate: config.planner.minimum_step_rate,
            max_step_rate: config.ticker.frequency_hz,
        }
    }

    /// Convert a position in millimeters to steps on one axis.
    #[inline]
    pub fn mm_to_steps(&self, axis: usize, mm: f32) -> i64 {
        libm::roundf(mm * self.steps_per_mm[axis]) as i64
    }

    /// Convert a position in steps to millimeters on one axis.
    #[inline]
    pub fn steps_to_mm(&self, axis: usize, steps: i64) -> f32 {
        steps as f32 / self.steps_per_mm[axis]
    }

    /// Largest path speed for a unit direction vector that keeps every axis under
    /// its own maximum.
    pub fn limit_speed_by_axes(&self, requested: f32, unit: &[f32; NUM_AXES]) -> f32 {
        limit_by_axes(requested, unit, &self.max_rate)
    }

    /// Largest path acceleration for a unit direction vector that keeps every axis
    /// under its own maximum.
    pub fn limit_acceleration_by_axes(&self, unit: &[f32; NUM_AXES]) -> f32 {
        limit_by_axes(f32::MAX, unit, &self.acceleration)
    }
}

fn limit_by_axes(requested: f32, unit: &[f32; NUM_AXES], limits: &[f32; NUM_AXES]) -> f32 {
    unit.iter()
        .zip(limits.iter())
        .filter(|(u, _)| **u != 0.0)
        .fold(requested, |limit, (u, max)| {
            let axis_bound = max / libm::fabsf(*u);
            if axis_bound < limit {
                axis_bound
            } else {
                limit
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::axis::{AxesConfig, AxisConfig};
    use crate::config::units::{MmPerSec, MmPerSecSquared};

    fn make_test_config() -> MachineConfig {
        let mut axes = AxesConfig::uniform(AxisConfig::new(
            80.0,
            MmPerSec(100.0),
            MmPerSecSquared(1000.0),
        ));
        axes.z = AxisConfig::new(400.0, MmPerSec(10.0), MmPerSecSquared(100.0));
        MachineConfig::new(axes)
    }

    #[test]
    fn test_mm_to_steps() {
        let constraints = MechanicalConstraints::from_config(&make_test_config());

        assert_eq!(constraints.mm_to_steps(0, 10.0), 800);
        assert_eq!(constraints.mm_to_steps(2, 1.0), 400);
        assert!((constraints.steps_to_mm(2, 200) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_speed_limited_by_slow_axis() {
        let constraints = MechanicalConstraints::from_config(&make_test_config());

        // 45 degrees in XZ: Z contributes 0.7071 of the path speed and caps at 10 mm/s
        let unit = [core::f32::consts::FRAC_1_SQRT_2, 0.0, core::f32::consts::FRAC_1_SQRT_2];
        let speed = constraints.limit_speed_by_axes(50.0, &unit);
        assert!((speed - 14.142).abs() < 0.01);

        let accel = constraints.limit_acceleration_by_axes(&unit);
        assert!((accel - 141.42).abs() < 0.1);
    }

    #[test]
    fn test_speed_unlimited_within_bounds() {
        let constraints = MechanicalConstraints::from_config(&make_test_config());

        let speed = constraints.limit_speed_by_axes(20.0, &[1.0, 0.0, 0.0]);
        assert_eq!(speed, 20.0);
    }
}
