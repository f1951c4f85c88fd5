//! Block execution - per-tick step decisions in 2.62 fixed point.

use fixed::types::I2F62;

use super::block::Block;
use super::profile::MotionPhase;
use super::{AxisMask, NUM_AXES};

/// Runtime state while a block is being stepped.
///
/// Each axis carries a rate (steps per tick) and an accumulator. Every tick the
/// rate follows the profile phase of the lead axis, the accumulator gains the
/// rate, and a step is due whenever the accumulator reaches one.
#[derive(Debug, Clone)]
pub struct BlockExecutor {
    /// The block being executed, prepared for the tick frequency.
    block: Block,

    /// Sub-step position per axis.
    counters: [I2F62; NUM_AXES],

    /// Current rate per axis in steps per tick.
    rates: [I2F62; NUM_AXES],

    /// Steps emitted so far per axis.
    steps_done: [u32; NUM_AXES],
}

impl BlockExecutor {
    /// Create an executor for a prepared block.
    pub fn new(block: Block) -> Self {
        let rates = block.tick_plan().start;

        Self {
            block,
            counters: [I2F62::ZERO; NUM_AXES],
            rates,
            steps_done: [0; NUM_AXES],
        }
    }

    /// Advance one tick and return the axes that must step.
    ///
    /// Total over its input: no allocation, no float math, no panics.
    pub fn tick(&mut self) -> AxisMask {
        let phase = self.phase();
        let plan = *self.block.tick_plan();
        let mut stepped = AxisMask::empty();

        for axis in 0..NUM_AXES {
            if self.steps_done[axis] >= self.block.steps[axis] {
                continue;
            }

            let rate = match phase {
                MotionPhase::Accelerating => self.rates[axis]
                    .saturating_add(plan.accel[axis])
                    .min(plan.nominal[axis]),
                MotionPhase::Cruising => plan.nominal[axis],
                MotionPhase::Decelerating => self.rates[axis]
                    .saturating_sub(plan.accel[axis])
                    .max(plan.floor[axis]),
                // Lead axis finished; trailing axes keep their last rate
                MotionPhase::Complete => self.rates[axis],
            };
            self.rates[axis] = rate;

            let mut counter = self.counters[axis].saturating_add(rate);
            if counter >= I2F62::ONE {
                counter -= I2F62::ONE;
                self.steps_done[axis] += 1;
                stepped.insert_axis(axis);
            }
            self.counters[axis] = counter;
        }

        stepped
    }

    /// Check if every axis has emitted all of its steps.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.steps_done
            .iter()
            .zip(self.block.steps.iter())
            .all(|(done, total)| done >= total)
    }

    /// Current phase, following the lead axis.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.block.phase_at(self.steps_done[self.block.lead_axis])
    }

    /// Get the block being executed.
    #[inline]
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Steps emitted so far per axis.
    #[inline]
    pub fn steps_done(&self) -> [u32; NUM_AXES] {
        self.steps_done
    }

    /// Current rate of an axis in steps per tick.
    #[inline]
    pub fn rate(&self, axis: usize) -> I2F62 {
        self.rates[axis]
    }

    /// Progress of the lead axis (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        let total = self.block.steps_event_count;
        if total == 0 {
            1.0
        } else {
            self.steps_done[self.block.lead_axis] as f32 / total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(steps: [u32; NUM_AXES], nominal: f32, accel: f32, frequency: f32) -> Block {
        let mm = steps[0] as f32;
        let mut block = Block::new(steps, AxisMask::empty(), mm, nominal, accel, 10.0);
        block.prepare(frequency);
        block
    }

    fn run(executor: &mut BlockExecutor, limit: u32) -> ([u32; NUM_AXES], u32) {
        let mut counts = [0; NUM_AXES];
        let mut ticks = 0;
        while !executor.is_complete() && ticks < limit {
            let stepped = executor.tick();
            for axis in stepped.axes() {
                counts[axis] += 1;
            }
            ticks += 1;
        }
        (counts, ticks)
    }

    #[test]
    fn test_executor_emits_all_steps() {
        let block = prepared([200, 100, 0], 400.0, 4000.0, 10_000.0);
        let mut executor = BlockExecutor::new(block);

        let (counts, _) = run(&mut executor, 1_000_000);

        assert!(executor.is_complete());
        assert_eq!(counts, [200, 100, 0]);
        assert_eq!(executor.phase(), MotionPhase::Complete);
    }

    #[test]
    fn test_never_more_than_one_step_per_tick() {
        // Nominal far above the tick rate is capped at one step per tick
        let block = prepared([500, 0, 0], 1_000_000.0, 1.0e12, 1000.0);
        let mut executor = BlockExecutor::new(block);

        let (counts, ticks) = run(&mut executor, 100_000);

        assert_eq!(counts[0], 500);
        assert!(ticks >= 500);
    }

    #[test]
    fn test_phase_transitions() {
        let block = prepared([1000, 0, 0], 200.0, 2000.0, 10_000.0);
        let mut executor = BlockExecutor::new(block);

        let mut saw_accel = false;
        let mut saw_cruise = false;
        let mut saw_decel = false;

        while !executor.is_complete() {
            match executor.phase() {
                MotionPhase::Accelerating => saw_accel = true,
                MotionPhase::Cruising => saw_cruise = true,
                MotionPhase::Decelerating => saw_decel = true,
                MotionPhase::Complete => {}
            }
            executor.tick();
        }

        assert!(saw_accel);
        assert!(saw_cruise);
        assert!(saw_decel);
    }

    #[test]
    fn test_cruise_rate_reached() {
        let block = prepared([1000, 0, 0], 200.0, 2000.0, 10_000.0);
        let mut executor = BlockExecutor::new(block);

        while executor.phase() != MotionPhase::Cruising {
            executor.tick();
        }
        executor.tick();

        assert!((executor.rate(0).to_num::<f64>() - 0.02).abs() < 1e-9);
    }
}
