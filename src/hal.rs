//! Hardware abstraction for stepper outputs and safety inputs.
//!
//! The step ticker drives pins through [`StepperIo`]; [`PinBank`] implements
//! it over `embedded-hal` 1.0 output pins. [`InputBank`] samples the driver
//! fault line and limit switches into [`InputEvents`].

use bitflags::bitflags;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::MotorError;
use crate::motion::NUM_AXES;

/// Pin-level access used by the step ticker.
///
/// Levels are electrical (`true` = high); polarity is applied by the caller.
pub trait StepperIo {
    /// Drive the step pin of an axis.
    fn set_step(&mut self, axis: usize, high: bool) -> Result<(), MotorError>;

    /// Drive the direction pin of an axis.
    fn set_dir(&mut self, axis: usize, high: bool) -> Result<(), MotorError>;

    /// Drive the shared driver enable line.
    fn set_enable(&mut self, high: bool) -> Result<(), MotorError>;

    /// Drive the shared driver reset line.
    fn set_reset(&mut self, high: bool) -> Result<(), MotorError>;
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), MotorError> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|_| MotorError::PinError)
}

/// [`StepperIo`] over `embedded-hal` output pins.
pub struct PinBank<STEP, DIR, EN, RST>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    RST: OutputPin,
{
    step: [STEP; NUM_AXES],
    dir: [DIR; NUM_AXES],
    enable: EN,
    reset: RST,
}

impl<STEP, DIR, EN, RST> PinBank<STEP, DIR, EN, RST>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    RST: OutputPin,
{
    /// Group the driver pins, axes in X, Y, Z order.
    pub fn new(step: [STEP; NUM_AXES], dir: [DIR; NUM_AXES], enable: EN, reset: RST) -> Self {
        Self {
            step,
            dir,
            enable,
            reset,
        }
    }

    /// Release the pins.
    pub fn release(self) -> ([STEP; NUM_AXES], [DIR; NUM_AXES], EN, RST) {
        (self.step, self.dir, self.enable, self.reset)
    }
}

impl<STEP, DIR, EN, RST> StepperIo for PinBank<STEP, DIR, EN, RST>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    RST: OutputPin,
{
    fn set_step(&mut self, axis: usize, high: bool) -> Result<(), MotorError> {
        let pin = self.step.get_mut(axis).ok_or(MotorError::InvalidAxis(axis))?;
        drive(pin, high)
    }

    fn set_dir(&mut self, axis: usize, high: bool) -> Result<(), MotorError> {
        let pin = self.dir.get_mut(axis).ok_or(MotorError::InvalidAxis(axis))?;
        drive(pin, high)
    }

    fn set_enable(&mut self, high: bool) -> Result<(), MotorError> {
        drive(&mut self.enable, high)
    }

    fn set_reset(&mut self, high: bool) -> Result<(), MotorError> {
        drive(&mut self.reset, high)
    }
}

bitflags! {
    /// Safety input events sampled from the fault and limit lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputEvents: u8 {
        /// X limit switch tripped.
        const LIMIT_X      = 0x01;
        /// Y limit switch tripped.
        const LIMIT_Y      = 0x02;
        /// Z limit switch tripped.
        const LIMIT_Z      = 0x04;
        /// Global stepper driver fault.
        const DRIVER_FAULT = 0x80;
    }
}

impl InputEvents {
    /// All limit switch flags.
    pub const LIMITS: Self = Self::from_bits_truncate(
        Self::LIMIT_X.bits() | Self::LIMIT_Y.bits() | Self::LIMIT_Z.bits(),
    );

    /// Limit flag for an axis index.
    pub const fn limit(axis: usize) -> Self {
        Self::from_bits_truncate(1 << axis)
    }
}

/// Samples the driver fault line and one limit switch per axis.
pub struct InputBank<FAULT, LIMIT>
where
    FAULT: InputPin,
    LIMIT: InputPin,
{
    fault: FAULT,
    limits: [LIMIT; NUM_AXES],
    fault_active_low: bool,
    limit_active_high: bool,
}

impl<FAULT, LIMIT> InputBank<FAULT, LIMIT>
where
    FAULT: InputPin,
    LIMIT: InputPin,
{
    /// Group the input pins with their active levels.
    pub fn new(
        fault: FAULT,
        limits: [LIMIT; NUM_AXES],
        fault_active_low: bool,
        limit_active_high: bool,
    ) -> Self {
        Self {
            fault,
            limits,
            fault_active_low,
            limit_active_high,
        }
    }

    /// Build from the input section of the machine configuration.
    pub fn from_config(
        fault: FAULT,
        limits: [LIMIT; NUM_AXES],
        config: &crate::config::InputConfig,
    ) -> Self {
        Self::new(fault, limits, config.fault_active_low, config.limit_active_high)
    }

    /// Read every input and report the active ones.
    pub fn sample(&mut self) -> Result<InputEvents, MotorError> {
        let mut events = InputEvents::empty();

        let fault_high = self.fault.is_high().map_err(|_| MotorError::PinError)?;
        if fault_high != self.fault_active_low {
            events |= InputEvents::DRIVER_FAULT;
        }

        for (axis, pin) in self.limits.iter_mut().enumerate() {
            let high = pin.is_high().map_err(|_| MotorError::PinError)?;
            if high == self.limit_active_high {
                events |= InputEvents::limit(axis);
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn test_pin_bank_drives_levels() {
        let step = [
            PinMock::new(&[Transaction::set(State::High)]),
            PinMock::new(&[]),
            PinMock::new(&[]),
        ];
        let dir = [
            PinMock::new(&[]),
            PinMock::new(&[Transaction::set(State::Low)]),
            PinMock::new(&[]),
        ];
        let enable = PinMock::new(&[Transaction::set(State::Low)]);
        let reset = PinMock::new(&[]);

        let mut bank = PinBank::new(step, dir, enable, reset);
        bank.set_step(0, true).unwrap();
        bank.set_dir(1, false).unwrap();
        bank.set_enable(false).unwrap();
        assert_eq!(bank.set_step(3, true), Err(MotorError::InvalidAxis(3)));

        let (mut step, mut dir, mut enable, mut reset) = bank.release();
        step.iter_mut().chain(dir.iter_mut()).for_each(|p| p.done());
        enable.done();
        reset.done();
    }

    #[test]
    fn test_input_sampling() {
        // Fault active low and asserted, Y limit tripped
        let fault = PinMock::new(&[Transaction::get(State::Low)]);
        let limits = [
            PinMock::new(&[Transaction::get(State::Low)]),
            PinMock::new(&[Transaction::get(State::High)]),
            PinMock::new(&[Transaction::get(State::Low)]),
        ];

        let mut inputs = InputBank::new(fault, limits, true, true);
        let events = inputs.sample().unwrap();

        assert_eq!(events, InputEvents::DRIVER_FAULT | InputEvents::LIMIT_Y);
        assert_eq!(events & InputEvents::LIMITS, InputEvents::LIMIT_Y);

        inputs.fault.done();
        inputs.limits.iter_mut().for_each(|p| p.done());
    }
}
