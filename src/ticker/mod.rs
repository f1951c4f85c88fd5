//! Real-time step generation.
//!
//! [`StepTicker::step_tick`] runs from a fixed-rate timer interrupt. It walks
//! the head block of the [`Conveyor`] with a [`BlockExecutor`], raises step
//! pins for the axes that are due, and hands over to the next block in the same
//! tick the previous one finishes. [`StepTicker::unstep_tick`] runs from a
//! second, offset interrupt and lowers the pulses again.
//!
//! Nothing in the tick path allocates, logs or returns an error. A failing pin
//! write is latched in [`StepTicker::pin_fault`] for the foreground to inspect.

mod builder;
mod shared;

pub use builder::StepTickerBuilder;
pub use shared::SharedTicker;

use crate::conveyor::{Claim, Conveyor};
use crate::error::{ConfigError, Result};
use crate::hal::StepperIo;
use crate::motion::{AxisMask, Block, BlockExecutor, MotionPhase, NUM_AXES};

/// Fixed-frequency step generator, the consumer side of the [`Conveyor`].
pub struct StepTicker<IO: StepperIo> {
    io: IO,

    /// Tick rate in Hz.
    frequency: f32,
    /// Frequency to switch to at the next block boundary.
    pending_frequency: Option<f32>,
    /// Clock feeding the step timer.
    timer_clock_hz: u32,
    /// Timer counts per tick.
    period: u32,
    /// Step pulse width.
    unstep_time_us: u8,

    step_inversion: AxisMask,
    dir_inversion: AxisMask,
    enable_active_low: bool,
    reset_active_low: bool,

    /// Step pins currently at their active level.
    unstep_bits: AxisMask,
    /// Axes whose motor is energized.
    motor_enable_bits: AxisMask,
    /// Last driven enable state, `None` before the first write.
    drivers_enabled: Option<bool>,
    /// Last driven reset state, `None` before the first write.
    drivers_reset: Option<bool>,

    current: Option<BlockExecutor>,
    /// Flush epoch of the current claim.
    epoch: u32,
    /// Machine position in steps.
    position: [i64; NUM_AXES],
    running: bool,
    pin_fault: bool,
}

impl<IO: StepperIo> StepTicker<IO> {
    /// Create a builder.
    pub fn builder() -> StepTickerBuilder<IO> {
        StepTickerBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        io: IO,
        frequency: f32,
        timer_clock_hz: u32,
        unstep_time_us: u8,
        step_inversion: AxisMask,
        dir_inversion: AxisMask,
        enable_active_low: bool,
        reset_active_low: bool,
    ) -> Self {
        Self {
            io,
            frequency,
            pending_frequency: None,
            timer_clock_hz,
            period: period_for(timer_clock_hz, frequency),
            unstep_time_us,
            step_inversion,
            dir_inversion,
            enable_active_low,
            reset_active_low,
            unstep_bits: AxisMask::empty(),
            motor_enable_bits: AxisMask::empty(),
            drivers_enabled: None,
            drivers_reset: None,
            current: None,
            epoch: 0,
            position: [0; NUM_AXES],
            running: false,
            pin_fault: false,
        }
    }

    /// Start consuming blocks.
    pub fn start(&mut self) {
        self.running = true;
        debug!("step ticker started at {} Hz", self.frequency);
    }

    /// Check whether [`start`](Self::start) has been called.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance one tick. Call from the step timer interrupt.
    ///
    /// Returns the axes that stepped. With nothing queued this has no effect.
    pub fn step_tick<const N: usize>(&mut self, conveyor: &Conveyor<N>) -> AxisMask {
        if !self.running || !conveyor.is_running() {
            return AxisMask::empty();
        }

        // A flush since the claim means the block is gone; abandon it where it is
        if self.current.is_some() && conveyor.epoch() != self.epoch {
            self.current = None;
        }

        self.lower_step_pins();

        if self.current.is_none() && !self.start_next_block(conveyor) {
            return AxisMask::empty();
        }

        let (stepped, direction_bits, complete) = match self.current.as_mut() {
            Some(executor) => {
                let stepped = executor.tick();
                (stepped, executor.block().direction_bits, executor.is_complete())
            }
            None => return AxisMask::empty(),
        };

        for axis in stepped.axes() {
            self.write_step(axis, true);
            if direction_bits.contains_axis(axis) {
                self.position[axis] -= 1;
            } else {
                self.position[axis] += 1;
            }
        }
        self.unstep_bits |= stepped;

        if complete {
            self.current = None;
            conveyor.retire_front(self.epoch);
            self.start_next_block(conveyor);
        }

        stepped
    }

    /// Lower every raised step pin. Call from the unstep timer interrupt.
    pub fn unstep_tick(&mut self) {
        self.lower_step_pins();
    }

    fn lower_step_pins(&mut self) {
        for axis in self.unstep_bits.axes() {
            self.write_step(axis, false);
        }
        self.unstep_bits = AxisMask::empty();
    }

    fn start_next_block<const N: usize>(&mut self, conveyor: &Conveyor<N>) -> bool {
        let Some(Claim { mut block, epoch }) = conveyor.peek_front() else {
            return false;
        };

        if let Some(frequency) = self.pending_frequency.take() {
            self.apply_frequency(frequency);
        }
        if !block.is_prepared_for(self.frequency) {
            block.prepare(self.frequency);
        }

        // The previous block's last pulse must end before any direction change
        self.lower_step_pins();
        for axis in 0..NUM_AXES {
            if block.steps[axis] > 0 {
                let negative = block.direction_bits.contains_axis(axis);
                self.write_dir(axis, negative != self.dir_inversion.contains_axis(axis));
                self.motor_enable_bits.insert_axis(axis);
            }
        }
        self.enable_stepper_drivers(true);

        self.epoch = epoch;
        self.current = Some(BlockExecutor::new(block));
        true
    }

    fn write_step(&mut self, axis: usize, active: bool) {
        let level = active != self.step_inversion.contains_axis(axis);
        if self.io.set_step(axis, level).is_err() {
            self.pin_fault = true;
        }
    }

    fn write_dir(&mut self, axis: usize, level: bool) {
        if self.io.set_dir(axis, level).is_err() {
            self.pin_fault = true;
        }
    }

    /// Drop the active block without stepping further and lower all step pins.
    ///
    /// The block is abandoned at its current step, not rewound.
    pub fn abort(&mut self) {
        if let Some(executor) = self.current.take() {
            debug!(
                "abandoned block at step {} of {}",
                executor.steps_done()[executor.block().lead_axis],
                executor.block().steps_event_count
            );
        }
        for axis in 0..NUM_AXES {
            self.write_step(axis, false);
        }
        self.unstep_bits = AxisMask::empty();
    }

    /// Change the tick rate.
    ///
    /// Takes effect at the next block boundary, or immediately when idle, so a
    /// block in flight keeps the rates it was prepared with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFrequency` unless `0 < frequency <= timer clock`.
    pub fn set_frequency(&mut self, frequency: f32) -> Result<()> {
        if !(frequency > 0.0) || frequency > self.timer_clock_hz as f32 {
            return Err(ConfigError::InvalidFrequency(frequency).into());
        }

        if self.current.is_some() {
            self.pending_frequency = Some(frequency);
        } else {
            self.pending_frequency = None;
            self.apply_frequency(frequency);
        }
        info!("step tick frequency set to {} Hz", frequency);
        Ok(())
    }

    fn apply_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.period = period_for(self.timer_clock_hz, frequency);
    }

    /// Tick rate in Hz currently in use.
    #[inline]
    pub fn get_frequency(&self) -> f32 {
        self.frequency
    }

    /// Timer counts per tick.
    #[inline]
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Set the step pulse width in microseconds.
    pub fn set_unstep_time(&mut self, microseconds: u8) {
        self.unstep_time_us = microseconds;
    }

    /// Timer counts between a step edge and its unstep tick.
    pub fn unstep_delay_ticks(&self) -> u32 {
        (self.timer_clock_hz as u64 * self.unstep_time_us as u64 / 1_000_000) as u32
    }

    /// Energize or release every stepper driver. Repeated calls are no-ops.
    pub fn enable_stepper_drivers(&mut self, enable: bool) {
        if self.drivers_enabled == Some(enable) {
            return;
        }
        let level = enable != self.enable_active_low;
        if self.io.set_enable(level).is_err() {
            self.pin_fault = true;
            return;
        }
        self.drivers_enabled = Some(enable);
    }

    /// Check whether the drivers are energized.
    #[inline]
    pub fn are_drivers_enabled(&self) -> bool {
        self.drivers_enabled == Some(true)
    }

    /// Hold or release the drivers' reset line. Repeated calls are no-ops.
    pub fn reset_stepper_drivers(&mut self, reset: bool) {
        if self.drivers_reset == Some(reset) {
            return;
        }
        let level = reset != self.reset_active_low;
        if self.io.set_reset(level).is_err() {
            self.pin_fault = true;
            return;
        }
        self.drivers_reset = Some(reset);
    }

    /// Check whether the drivers are held in reset.
    #[inline]
    pub fn are_drivers_in_reset(&self) -> bool {
        self.drivers_reset == Some(true)
    }

    /// Mark an axis motor as energized.
    #[inline]
    pub fn enable_motor(&mut self, axis: usize) {
        if axis < NUM_AXES {
            self.motor_enable_bits.insert_axis(axis);
        }
    }

    /// Mark an axis motor as released.
    #[inline]
    pub fn disable_motor(&mut self, axis: usize) {
        if axis < NUM_AXES {
            self.motor_enable_bits.remove_axis(axis);
        }
    }

    /// Mark every axis motor as released.
    #[inline]
    pub fn disable_all_motors(&mut self) {
        self.motor_enable_bits = AxisMask::empty();
    }

    /// True while any axis motor is still energized.
    #[inline]
    pub fn are_motors_still_moving(&self) -> bool {
        !self.motor_enable_bits.is_empty()
    }

    /// Axes whose motor is energized.
    #[inline]
    pub fn motor_enable_bits(&self) -> AxisMask {
        self.motor_enable_bits
    }

    /// Switch step and direction pin polarity and re-drive the pins.
    pub fn apply_inversion_masks(&mut self, steps: AxisMask, dirs: AxisMask) {
        self.step_inversion = steps;
        self.dir_inversion = dirs;

        for axis in 0..NUM_AXES {
            self.write_step(axis, self.unstep_bits.contains_axis(axis));
        }

        let direction_bits = self
            .current
            .as_ref()
            .map_or(AxisMask::empty(), |executor| executor.block().direction_bits);
        for axis in 0..NUM_AXES {
            let level = direction_bits.contains_axis(axis) != self.dir_inversion.contains_axis(axis);
            self.write_dir(axis, level);
        }
        debug!(
            "inversion masks applied: steps {} dirs {}",
            self.step_inversion.bits(),
            self.dir_inversion.bits()
        );
    }

    /// The block being executed, if any.
    #[inline]
    pub fn get_current_block(&self) -> Option<&Block> {
        self.current.as_ref().map(|executor| executor.block())
    }

    /// Phase of the block being executed; `None` when idle.
    #[inline]
    pub fn phase(&self) -> Option<MotionPhase> {
        self.current.as_ref().map(|executor| executor.phase())
    }

    /// Machine position in steps.
    #[inline]
    pub fn position(&self) -> [i64; NUM_AXES] {
        self.position
    }

    /// Overwrite the machine position, e.g. after homing.
    pub fn set_position(&mut self, steps: [i64; NUM_AXES]) {
        self.position = steps;
    }

    /// True if a pin write failed since the last [`clear_pin_fault`](Self::clear_pin_fault).
    #[inline]
    pub fn pin_fault(&self) -> bool {
        self.pin_fault
    }

    /// Reset the pin fault latch.
    pub fn clear_pin_fault(&mut self) {
        self.pin_fault = false;
    }

    /// Get the pin interface.
    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Get the pin interface mutably.
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Release the pin interface.
    pub fn release(self) -> IO {
        self.io
    }
}

fn period_for(timer_clock_hz: u32, frequency: f32) -> u32 {
    (timer_clock_hz as f32 / frequency) as u32
}
