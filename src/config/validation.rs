//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::motion::NUM_AXES;

use super::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Every axis has positive steps/mm, speed and acceleration
/// - Planner tuning values are non-negative
/// - The tick frequency fits the timer clock and the step pulse fits one tick
/// - Inversion masks only name existing axes
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for (index, axis) in config.axes.as_array().iter().enumerate() {
        validate_axis(index, axis)?;
    }

    validate_planner(&config.planner)?;
    validate_ticker(&config.ticker)?;

    Ok(())
}

fn validate_axis(axis: usize, config: &super::AxisConfig) -> Result<()> {
    if !(config.steps_per_mm > 0.0) {
        return Err(Error::Config(ConfigError::InvalidStepsPerMm {
            axis,
            value: config.steps_per_mm,
        }));
    }

    if !(config.max_rate.0 > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxRate {
            axis,
            value: config.max_rate.0,
        }));
    }

    if !(config.acceleration.0 > 0.0) {
        return Err(Error::Config(ConfigError::InvalidAcceleration {
            axis,
            value: config.acceleration.0,
        }));
    }

    Ok(())
}

fn validate_planner(config: &super::PlannerConfig) -> Result<()> {
    if !(config.junction_deviation_mm >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
            config.junction_deviation_mm,
        )));
    }

    for value in [config.minimum_planner_speed, config.minimum_step_rate] {
        if !(value >= 0.0) {
            return Err(Error::Config(ConfigError::InvalidMinimumSpeed(value)));
        }
    }

    Ok(())
}

fn validate_ticker(config: &super::TickerConfig) -> Result<()> {
    let frequency = config.frequency_hz;
    if !(frequency > 0.0) || frequency > config.timer_clock_hz as f32 {
        return Err(Error::Config(ConfigError::InvalidFrequency(frequency)));
    }

    // Pulse must fall before the next tick raises it again
    let tick_us = 1_000_000.0 / frequency;
    if config.unstep_time_us == 0 || config.unstep_time_us as f32 >= tick_us {
        return Err(Error::Config(ConfigError::InvalidUnstepTime(
            config.unstep_time_us,
        )));
    }

    let valid_bits = (1u8 << NUM_AXES) - 1;
    for mask in [config.step_inversion_mask, config.dir_inversion_mask] {
        if mask & !valid_bits != 0 {
            return Err(Error::Config(ConfigError::InvalidMask(mask)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{MmPerSec, MmPerSecSquared};
    use crate::config::{AxesConfig, AxisConfig};

    fn valid_config() -> MachineConfig {
        MachineConfig::new(AxesConfig::uniform(AxisConfig::new(
            80.0,
            MmPerSec(100.0),
            MmPerSecSquared(1000.0),
        )))
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_steps_per_mm() {
        let mut config = valid_config();
        config.axes.y.steps_per_mm = 0.0;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidStepsPerMm { axis: 1, .. }))
        ));
    }

    #[test]
    fn test_nan_acceleration_rejected() {
        let mut config = valid_config();
        config.axes.z.acceleration = MmPerSecSquared(f32::NAN);

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidAcceleration { axis: 2, .. }))
        ));
    }

    #[test]
    fn test_pulse_wider_than_tick() {
        let mut config = valid_config();
        // 100 kHz gives a 10 us tick
        config.ticker.unstep_time_us = 10;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidUnstepTime(10)))
        ));
    }

    #[test]
    fn test_mask_beyond_axes() {
        let mut config = valid_config();
        config.ticker.dir_inversion_mask = 0b1001;

        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidMask(0b1001)))
        ));
    }
}
