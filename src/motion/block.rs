//! Planned linear move segment.

use fixed::types::I2F62;

use super::profile::{self, Clamp, MotionPhase, ProfileFit, Trapezoid};
use super::{AxisMask, NUM_AXES};

/// Per-axis fixed-point tick parameters, in steps per tick (2.62 format).
///
/// Produced by [`Block::prepare`] in the foreground so the step interrupt only
/// adds and compares integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPlan {
    /// Rate at the first tick.
    pub start: [I2F62; NUM_AXES],
    /// Cruise rate, never above one step per tick.
    pub nominal: [I2F62; NUM_AXES],
    /// Lowest rate reached while decelerating.
    pub floor: [I2F62; NUM_AXES],
    /// Rate change per tick while ramping.
    pub accel: [I2F62; NUM_AXES],
}

impl TickPlan {
    const ZERO: Self = Self {
        start: [I2F62::ZERO; NUM_AXES],
        nominal: [I2F62::ZERO; NUM_AXES],
        floor: [I2F62::ZERO; NUM_AXES],
        accel: [I2F62::ZERO; NUM_AXES],
    };
}

/// One planned linear move with its velocity profile.
///
/// Path speeds (`*_speed`) are in mm/s, rates (`*_rate`) are lead-axis steps/s.
/// Once the step ticker claims a block it is never changed again; while pending,
/// the planner may rewrite its entry and exit speeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Steps to emit on each axis.
    pub steps: [u32; NUM_AXES],
    /// Axes travelling in the negative direction.
    pub direction_bits: AxisMask,
    /// Largest per-axis step count.
    pub steps_event_count: u32,
    /// Axis with the largest step count.
    pub lead_axis: usize,
    /// Euclidean path length in mm.
    pub millimeters: f32,

    /// Cruise speed in mm/s.
    pub nominal_speed: f32,
    /// Speed at the first step in mm/s.
    pub entry_speed: f32,
    /// Speed at the last step in mm/s.
    pub exit_speed: f32,
    /// Highest entry speed the junction with the previous block allows.
    pub max_entry_speed: f32,
    /// Path acceleration in mm/s².
    pub acceleration: f32,

    /// Cruise rate in steps/s.
    pub nominal_rate: f32,
    /// Rate at the first step in steps/s.
    pub initial_rate: f32,
    /// Rate at the last step in steps/s.
    pub final_rate: f32,
    /// Lower bound for `initial_rate` and `final_rate`.
    pub minimum_rate: f32,

    /// Lead-axis step index where acceleration ends.
    pub accelerate_until: u32,
    /// Lead-axis step index where deceleration starts.
    pub decelerate_after: u32,
    /// Outcome of the most recent [`calculate_trapezoid`](Block::calculate_trapezoid).
    pub fit: ProfileFit,

    tick: TickPlan,
    plan_frequency: f32,
}

impl Block {
    /// Create a block for the given per-axis steps.
    ///
    /// The profile starts and ends at rest until [`calculate_trapezoid`] is called.
    ///
    /// [`calculate_trapezoid`]: Block::calculate_trapezoid
    pub fn new(
        steps: [u32; NUM_AXES],
        direction_bits: AxisMask,
        millimeters: f32,
        nominal_speed: f32,
        acceleration: f32,
        minimum_rate: f32,
    ) -> Self {
        let (lead_axis, steps_event_count) = steps
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0), |best, (axis, n)| if n > best.1 { (axis, n) } else { best });

        let mut block = Self {
            steps,
            direction_bits,
            steps_event_count,
            lead_axis,
            millimeters,
            nominal_speed,
            entry_speed: 0.0,
            exit_speed: 0.0,
            max_entry_speed: 0.0,
            acceleration,
            nominal_rate: 0.0,
            initial_rate: 0.0,
            final_rate: 0.0,
            minimum_rate,
            accelerate_until: 0,
            decelerate_after: 0,
            fit: ProfileFit::Feasible,
            tick: TickPlan::ZERO,
            plan_frequency: 0.0,
        };
        block.nominal_rate = nominal_speed * block.rate_factor();
        block.calculate_trapezoid(0.0, 0.0);
        block
    }

    /// Steps per mm of path on the lead axis.
    #[inline]
    pub fn rate_factor(&self) -> f32 {
        if self.millimeters > 0.0 {
            self.steps_event_count as f32 / self.millimeters
        } else {
            1.0
        }
    }

    /// Check whether this block moves no axis.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps_event_count == 0
    }

    /// Refit the profile for new boundary speeds in mm/s.
    ///
    /// Unreachable speeds are lowered to what `acceleration` allows over the
    /// block and reported in the returned [`ProfileFit`].
    pub fn calculate_trapezoid(&mut self, entry_speed: f32, exit_speed: f32) -> ProfileFit {
        let factor = self.rate_factor();
        let (trapezoid, clamp) = profile::fit_trapezoid(
            self.steps_event_count,
            entry_speed * factor,
            exit_speed * factor,
            self.nominal_rate,
            self.acceleration * factor,
        );

        self.entry_speed = trapezoid.entry / factor;
        self.exit_speed = trapezoid.exit / factor;
        self.accelerate_until = trapezoid.accelerate_until;
        self.decelerate_after = trapezoid.decelerate_after;

        let floor = self.minimum_rate.min(self.nominal_rate);
        self.initial_rate = trapezoid.entry.max(floor);
        self.final_rate = trapezoid.exit.max(floor);

        // Any cached tick plan is stale now
        self.plan_frequency = 0.0;

        self.fit = match clamp {
            Clamp::None => ProfileFit::Feasible,
            Clamp::Entry => {
                warn!(
                    "entry speed {} mm/s unreachable over {} steps, clamped to {}",
                    entry_speed,
                    self.steps_event_count,
                    self.entry_speed
                );
                ProfileFit::EntryClamped {
                    requested: entry_speed,
                    applied: self.entry_speed,
                }
            }
            Clamp::Exit => {
                warn!(
                    "exit speed {} mm/s unreachable over {} steps, clamped to {}",
                    exit_speed,
                    self.steps_event_count,
                    self.exit_speed
                );
                ProfileFit::ExitClamped {
                    requested: exit_speed,
                    applied: self.exit_speed,
                }
            }
        };
        self.fit
    }

    fn trapezoid(&self) -> Trapezoid {
        let factor = self.rate_factor();
        Trapezoid {
            entry: self.entry_speed * factor,
            exit: self.exit_speed * factor,
            accelerate_until: self.accelerate_until,
            decelerate_after: self.decelerate_after,
        }
    }

    /// Path speed in mm/s at a lead-axis step index.
    pub fn speed_at(&self, step: u32) -> f32 {
        let factor = self.rate_factor();
        profile::rate_at(
            &self.trapezoid(),
            self.steps_event_count,
            self.nominal_rate,
            self.acceleration * factor,
            step,
        ) / factor
    }

    /// Profile phase at a lead-axis step index.
    #[inline]
    pub fn phase_at(&self, step: u32) -> MotionPhase {
        profile::phase_at(
            self.accelerate_until,
            self.decelerate_after,
            self.steps_event_count,
            step,
        )
    }

    /// Check whether the profile has no cruise phase.
    #[inline]
    pub fn is_triangular(&self) -> bool {
        self.accelerate_until == self.decelerate_after
    }

    /// Precompute the fixed-point tick parameters for a tick frequency in Hz.
    pub fn prepare(&mut self, frequency: f32) {
        let n = self.steps_event_count.max(1) as f64;
        let per_tick = 1.0 / frequency as f64;
        let accel_rate = (self.acceleration * self.rate_factor()) as f64;

        for axis in 0..NUM_AXES {
            let ratio = self.steps[axis] as f64 / n;
            let nominal = (self.nominal_rate as f64 * ratio * per_tick).min(1.0);
            let start = (self.initial_rate as f64 * ratio * per_tick).min(nominal);
            // At least one lead step per second so deceleration cannot stall short of the end
            let floor = (self.final_rate.max(1.0) as f64 * ratio * per_tick).min(nominal);
            let accel = accel_rate * ratio * per_tick * per_tick;

            self.tick.nominal[axis] = I2F62::saturating_from_num(nominal);
            self.tick.start[axis] = I2F62::saturating_from_num(start);
            self.tick.floor[axis] = I2F62::saturating_from_num(floor);
            self.tick.accel[axis] = I2F62::saturating_from_num(accel);
        }

        self.plan_frequency = frequency;
    }

    /// Check whether the tick plan matches a tick frequency.
    #[inline]
    pub fn is_prepared_for(&self, frequency: f32) -> bool {
        self.plan_frequency == frequency
    }

    /// Fixed-point tick parameters from the last [`prepare`](Block::prepare).
    #[inline]
    pub fn tick_plan(&self) -> &TickPlan {
        &self.tick
    }
}
