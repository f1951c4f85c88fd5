//! Builder pattern for StepTicker.

use crate::config::TickerConfig;
use crate::error::{ConfigError, Error, Result};
use crate::hal::StepperIo;
use crate::motion::AxisMask;

use super::StepTicker;

/// Builder for creating StepTicker instances.
pub struct StepTickerBuilder<IO: StepperIo> {
    io: Option<IO>,
    frequency: f32,
    timer_clock_hz: u32,
    unstep_time_us: u8,
    step_inversion: AxisMask,
    dir_inversion: AxisMask,
    enable_active_low: bool,
    reset_active_low: bool,
}

impl<IO: StepperIo> Default for StepTickerBuilder<IO> {
    fn default() -> Self {
        Self::new()
    }
}

impl<IO: StepperIo> StepTickerBuilder<IO> {
    /// Create a new builder with the default ticker settings.
    pub fn new() -> Self {
        Self::from_defaults(&TickerConfig::default())
    }

    fn from_defaults(config: &TickerConfig) -> Self {
        Self {
            io: None,
            frequency: config.frequency_hz,
            timer_clock_hz: config.timer_clock_hz,
            unstep_time_us: config.unstep_time_us,
            step_inversion: AxisMask::from_bits_truncate(config.step_inversion_mask),
            dir_inversion: AxisMask::from_bits_truncate(config.dir_inversion_mask),
            enable_active_low: config.enable_active_low,
            reset_active_low: config.reset_active_low,
        }
    }

    /// Set the pin interface.
    pub fn io(mut self, io: IO) -> Self {
        self.io = Some(io);
        self
    }

    /// Set the tick frequency in Hz.
    pub fn frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the clock feeding the step timer.
    pub fn timer_clock_hz(mut self, hz: u32) -> Self {
        self.timer_clock_hz = hz;
        self
    }

    /// Set the step pulse width in microseconds.
    pub fn unstep_time_us(mut self, microseconds: u8) -> Self {
        self.unstep_time_us = microseconds;
        self
    }

    /// Set which axes have an active-low step pin.
    pub fn step_inversion(mut self, mask: AxisMask) -> Self {
        self.step_inversion = mask;
        self
    }

    /// Set which axes have an inverted direction pin.
    pub fn dir_inversion(mut self, mask: AxisMask) -> Self {
        self.dir_inversion = mask;
        self
    }

    /// Set driver enable polarity.
    pub fn enable_active_low(mut self, active_low: bool) -> Self {
        self.enable_active_low = active_low;
        self
    }

    /// Set driver reset polarity.
    pub fn reset_active_low(mut self, active_low: bool) -> Self {
        self.reset_active_low = active_low;
        self
    }

    /// Configure from the ticker section of the machine configuration.
    ///
    /// Keeps a pin interface that was already set.
    pub fn from_config(self, config: &TickerConfig) -> Self {
        let io = self.io;
        Self {
            io,
            ..Self::from_defaults(config)
        }
    }

    /// Build the StepTicker.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin interface is missing or the frequency does not
    /// fit the timer clock.
    pub fn build(self) -> Result<StepTicker<IO>> {
        let io = self
            .io
            .ok_or(Error::Config(ConfigError::MissingField("io")))?;

        if !(self.frequency > 0.0) || self.frequency > self.timer_clock_hz as f32 {
            return Err(Error::Config(ConfigError::InvalidFrequency(self.frequency)));
        }

        Ok(StepTicker::new(
            io,
            self.frequency,
            self.timer_clock_hz,
            self.unstep_time_us,
            self.step_inversion,
            self.dir_inversion,
            self.enable_active_low,
            self.reset_active_low,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotorError;

    struct NullIo;

    impl StepperIo for NullIo {
        fn set_step(&mut self, _: usize, _: bool) -> core::result::Result<(), MotorError> {
            Ok(())
        }
        fn set_dir(&mut self, _: usize, _: bool) -> core::result::Result<(), MotorError> {
            Ok(())
        }
        fn set_enable(&mut self, _: bool) -> core::result::Result<(), MotorError> {
            Ok(())
        }
        fn set_reset(&mut self, _: bool) -> core::result::Result<(), MotorError> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_io() {
        let result = StepTickerBuilder::<NullIo>::new().build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField("io")))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = TickerConfig {
            frequency_hz: 40_000.0,
            timer_clock_hz: 80_000_000,
            ..TickerConfig::default()
        };

        let ticker = StepTicker::builder()
            .io(NullIo)
            .from_config(&config)
            .build()
            .unwrap();

        assert_eq!(ticker.get_frequency(), 40_000.0);
        assert_eq!(ticker.period(), 2000);
        assert!(!ticker.is_running());
    }

    #[test]
    fn test_frequency_above_clock() {
        let result = StepTicker::builder()
            .io(NullIo)
            .timer_clock_hz(1000)
            .frequency(2000.0)
            .build();

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidFrequency(_)))
        ));
    }
}
