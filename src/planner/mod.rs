//! Look-ahead motion planner.
//!
//! Turns target positions into [`Block`]s and keeps the speeds of queued but
//! not yet started blocks consistent: every block ends at the speed the next
//! one starts with, no junction exceeds its cornering bound, and the last block
//! in the queue always ends at rest.

mod junction;

use libm::sqrtf;

use crate::config::MechanicalConstraints;
use crate::conveyor::Conveyor;
use crate::error::{ConfigError, MotionError, Result};
use crate::motion::{AxisMask, Block, NUM_AXES};

use junction::{junction_speed, MoveVector};

/// Look-ahead planner, the producer side of the [`Conveyor`].
#[derive(Debug, Clone)]
pub struct Planner {
    constraints: MechanicalConstraints,
    /// Last planned position in steps.
    position: [i64; NUM_AXES],
    /// Direction and limits of the last planned move.
    previous: Option<MoveVector>,
}

impl Planner {
    /// Create a planner at the machine origin.
    pub fn new(constraints: MechanicalConstraints) -> Self {
        Self {
            constraints,
            position: [0; NUM_AXES],
            previous: None,
        }
    }

    /// Get the mechanical constraints.
    #[inline]
    pub fn constraints(&self) -> &MechanicalConstraints {
        &self.constraints
    }

    /// Last planned position in steps.
    #[inline]
    pub fn position(&self) -> [i64; NUM_AXES] {
        self.position
    }

    /// Last planned position in mm.
    pub fn position_mm(&self) -> [f32; NUM_AXES] {
        let mut mm = [0.0; NUM_AXES];
        for (axis, value) in mm.iter_mut().enumerate() {
            *value = self.constraints.steps_to_mm(axis, self.position[axis]);
        }
        mm
    }

    /// Plan for a new step tick rate in Hz.
    ///
    /// Later moves are capped at one lead-axis step per tick of `frequency`,
    /// and every queued block not yet claimed is prepared for it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFrequency` unless `frequency` is finite and > 0.
    pub fn set_step_frequency<const N: usize>(
        &mut self,
        conveyor: &Conveyor<N>,
        frequency: f32,
    ) -> Result<()> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(ConfigError::InvalidFrequency(frequency).into());
        }

        self.constraints.max_step_rate = frequency;
        critical_section::with(|cs| {
            conveyor.with_pending(cs, |_, pending| {
                for block in pending.iter_mut() {
                    block.prepare(frequency);
                }
            })
        });
        debug!("planner step frequency set to {} Hz", frequency);
        Ok(())
    }

    /// Reset the planned position, e.g. to where a halt left the machine.
    ///
    /// The next move starts from rest.
    pub fn sync_position(&mut self, steps: [i64; NUM_AXES]) {
        self.position = steps;
        self.previous = None;
        debug!(
            "planner position synced to [{}, {}, {}]",
            steps[0],
            steps[1],
            steps[2]
        );
    }

    /// Plan a linear move to `target_mm` at `feed_rate` mm/s and queue it.
    ///
    /// Returns a copy of the queued block after look-ahead.
    ///
    /// # Errors
    ///
    /// - `MotionError::InvalidFeedRate` for a non-positive or non-finite feed
    /// - `MotionError::TargetOutOfRange` for a non-finite target or one more
    ///   than `u32::MAX` steps away on any axis
    /// - `MotionError::MoveTooShort` when no axis would take a step
    /// - `QueueError::Full` when the conveyor is at capacity; retry later
    ///
    /// Planner state and the queue are unchanged on error.
    pub fn plan<const N: usize>(
        &mut self,
        conveyor: &Conveyor<N>,
        target_mm: [f32; NUM_AXES],
        feed_rate: f32,
    ) -> Result<Block> {
        if !(feed_rate.is_finite() && feed_rate > 0.0) {
            return Err(MotionError::InvalidFeedRate(feed_rate).into());
        }

        let mut target = [0i64; NUM_AXES];
        let mut steps = [0u32; NUM_AXES];
        let mut delta_mm = [0.0f32; NUM_AXES];
        let mut direction_bits = AxisMask::empty();

        for axis in 0..NUM_AXES {
            let out_of_range = MotionError::TargetOutOfRange {
                axis,
                target_mm: target_mm[axis],
            };
            if !target_mm[axis].is_finite() {
                return Err(out_of_range.into());
            }
            target[axis] = self.constraints.mm_to_steps(axis, target_mm[axis]);
            let delta = target[axis]
                .checked_sub(self.position[axis])
                .ok_or_else(|| out_of_range.clone())?;
            steps[axis] = u32::try_from(delta.unsigned_abs()).map_err(|_| out_of_range)?;
            if delta < 0 {
                direction_bits.insert_axis(axis);
            }
            delta_mm[axis] = self.constraints.steps_to_mm(axis, delta);
        }

        let lead = steps.iter().copied().max().unwrap_or(0);
        if lead == 0 {
            return Err(MotionError::MoveTooShort {
                steps: 0,
                minimum: 1,
            }
            .into());
        }

        let millimeters = sqrtf(delta_mm.iter().map(|d| d * d).sum::<f32>());
        let unit = delta_mm.map(|d| d / millimeters);

        let mut nominal_speed = self.constraints.limit_speed_by_axes(feed_rate, &unit);
        // At most one lead-axis step per tick
        let factor = lead as f32 / millimeters;
        if nominal_speed * factor > self.constraints.max_step_rate {
            nominal_speed = self.constraints.max_step_rate / factor;
        }
        let acceleration = self.constraints.limit_acceleration_by_axes(&unit);

        let vector = MoveVector {
            unit,
            nominal_speed,
            acceleration,
        };
        let junction = self.previous.as_ref().map_or(0.0, |prev| {
            junction_speed(
                prev,
                &vector,
                self.constraints.junction_deviation,
                self.constraints.minimum_planner_speed,
            )
        });

        let mut block = Block::new(
            steps,
            direction_bits,
            millimeters,
            nominal_speed,
            acceleration,
            self.constraints.minimum_step_rate,
        );

        let planned = critical_section::with(|cs| {
            let max_entry = conveyor.with_pending(cs, |head, pending| {
                match (pending.last(), head) {
                    (Some(_), _) => junction,
                    // Only the executing block is ahead; its exit speed is final
                    (None, Some(active)) => junction.min(active.exit_speed),
                    (None, None) => 0.0,
                }
            });

            block.max_entry_speed = max_entry;
            let entry = max_entry.min(sqrtf(2.0 * acceleration * millimeters));
            block.calculate_trapezoid(entry, 0.0);

            conveyor.push_in(cs, block.clone())?;

            Ok::<Block, crate::Error>(conveyor.with_pending(cs, |_, pending| {
                recalculate(pending, self.constraints.max_step_rate);
                pending.last().map_or(block, |b| (**b).clone())
            }))
        })?;

        self.position = target;
        self.previous = Some(vector);

        trace!(
            "planned {} steps over {} mm, entry {} nominal {} mm/s",
            planned.steps_event_count,
            planned.millimeters,
            planned.entry_speed,
            planned.nominal_speed
        );

        Ok(planned)
    }
}

/// Look-ahead over the pending blocks, oldest first.
///
/// The first pending block's entry speed is pinned: it is the speed the block
/// ahead of it finishes at. The reverse pass raises entries toward their
/// junction limits as far as deceleration into the next block allows and stops
/// at the first block whose entry does not change. The forward pass then
/// lowers entries that acceleration from the previous block cannot reach.
///
/// Every re-profiled block is prepared for `frequency` so the tick interrupt
/// only has to do it when the frequency changed in between.
pub(crate) fn recalculate(pending: &mut [&mut Block], frequency: f32) {
    let count = pending.len();
    if count == 0 {
        return;
    }
    let last = count - 1;

    let mut stop = 0;
    let mut next_entry = 0.0f32;
    for index in (1..count).rev() {
        let block = &mut pending[index];
        let reachable =
            sqrtf(next_entry * next_entry + 2.0 * block.acceleration * block.millimeters);
        let entry = block.max_entry_speed.min(reachable);

        if index != last && entry == block.entry_speed {
            stop = index;
            break;
        }
        block.entry_speed = entry;
        next_entry = entry;
    }

    for index in (stop + 1)..count {
        let prev = &pending[index - 1];
        let reachable =
            sqrtf(prev.entry_speed * prev.entry_speed + 2.0 * prev.acceleration * prev.millimeters);
        if pending[index].entry_speed > reachable {
            pending[index].entry_speed = reachable;
        }
    }

    for index in stop..count {
        let exit = if index < last {
            pending[index + 1].entry_speed
        } else {
            0.0
        };
        let entry = pending[index].entry_speed;
        pending[index].calculate_trapezoid(entry, exit);
        pending[index].prepare(frequency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{MmPerSec, MmPerSecSquared};
    use crate::config::{AxesConfig, AxisConfig, MachineConfig};
    use crate::error::{Error, QueueError};
    use crate::motion::ProfileFit;

    fn planner() -> Planner {
        planner_with_max_rate(1000.0)
    }

    fn planner_with_max_rate(max_rate: f32) -> Planner {
        let mut config = MachineConfig::new(AxesConfig::uniform(AxisConfig::new(
            1.0,
            MmPerSec(max_rate),
            MmPerSecSquared(50.0),
        )));
        config.planner.minimum_step_rate = 0.0;
        config.ticker.frequency_hz = 10_000.0;
        Planner::new(MechanicalConstraints::from_config(&config))
    }

    #[test]
    fn test_plan_sets_directions() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        let block = planner.plan(&conveyor, [-10.0, 20.0, 0.0], 100.0).unwrap();

        assert_eq!(block.steps, [10, 20, 0]);
        assert!(block.direction_bits.contains_axis(0));
        assert!(!block.direction_bits.contains_axis(1));
        assert_eq!(planner.position(), [-10, 20, 0]);
        assert!(block.is_prepared_for(10_000.0));
    }

    #[test]
    fn test_invalid_feed_rejected() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        for feed in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                planner.plan(&conveyor, [10.0, 0.0, 0.0], feed),
                Err(Error::Motion(MotionError::InvalidFeedRate(_)))
            ));
        }
        assert!(conveyor.is_empty());
    }

    #[test]
    fn test_zero_move_rejected() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        let result = planner.plan(&conveyor, [0.2, 0.0, 0.0], 100.0);
        assert!(matches!(
            result,
            Err(Error::Motion(MotionError::MoveTooShort { steps: 0, .. }))
        ));
        assert!(conveyor.is_empty());
    }

    #[test]
    fn test_non_finite_target_rejected() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        planner.plan(&conveyor, [10.0, 0.0, 0.0], 100.0).unwrap();

        for bad in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            assert!(matches!(
                planner.plan(&conveyor, [bad, 0.0, 0.0], 100.0),
                Err(Error::Motion(MotionError::TargetOutOfRange { axis: 0, .. }))
            ));
        }
        assert_eq!(planner.position(), [10, 0, 0]);
        assert_eq!(conveyor.len(), 1);
    }

    #[test]
    fn test_target_beyond_one_block_rejected() {
        let mut config = MachineConfig::new(AxesConfig::uniform(AxisConfig::new(
            100.0,
            MmPerSec(1000.0),
            MmPerSecSquared(50.0),
        )));
        config.ticker.frequency_hz = 10_000.0;
        let mut planner = Planner::new(MechanicalConstraints::from_config(&config));
        let conveyor: Conveyor<8> = Conveyor::new();

        // 5e9 steps does not fit in one block
        let result = planner.plan(&conveyor, [0.0, 5.0e7, 0.0], 100.0);

        assert!(matches!(
            result,
            Err(Error::Motion(MotionError::TargetOutOfRange { axis: 1, .. }))
        ));
        assert_eq!(planner.position(), [0, 0, 0]);
        assert!(conveyor.is_empty());
    }

    #[test]
    fn test_queue_full_leaves_state() {
        let mut planner = planner();
        let conveyor: Conveyor<1> = Conveyor::new();

        planner.plan(&conveyor, [10.0, 0.0, 0.0], 100.0).unwrap();
        let result = planner.plan(&conveyor, [20.0, 0.0, 0.0], 100.0);

        assert_eq!(result, Err(Error::Queue(QueueError::Full)));
        assert_eq!(planner.position(), [10, 0, 0]);
    }

    #[test]
    fn test_nominal_capped_by_tick_rate() {
        let mut planner = planner_with_max_rate(1.0e6);
        let conveyor: Conveyor<8> = Conveyor::new();

        let block = planner.plan(&conveyor, [100.0, 0.0, 0.0], 50_000.0).unwrap();
        assert!((block.nominal_rate - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn test_step_frequency_change() {
        let mut planner = planner_with_max_rate(1.0e6);
        let conveyor: Conveyor<8> = Conveyor::new();

        let queued = planner.plan(&conveyor, [100.0, 0.0, 0.0], 50_000.0).unwrap();
        assert!(queued.is_prepared_for(10_000.0));

        planner.set_step_frequency(&conveyor, 20_000.0).unwrap();
        assert!(conveyor.peek_front().unwrap().block.is_prepared_for(20_000.0));

        let block = planner.plan(&conveyor, [200.0, 0.0, 0.0], 50_000.0).unwrap();
        assert!(block.is_prepared_for(20_000.0));
        assert!((block.nominal_rate - 20_000.0).abs() < 1.0);

        assert!(planner.set_step_frequency(&conveyor, 0.0).is_err());
        assert_eq!(planner.constraints().max_step_rate, 20_000.0);
    }

    #[test]
    fn test_collinear_lookahead() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        for x in [1000.0, 2000.0, 3000.0] {
            planner.plan(&conveyor, [x, 0.0, 0.0], 500.0).unwrap();
        }

        let junction = sqrtf(2.0 * 50.0 * 1000.0);
        let mut entries = [0.0; 3];
        let mut exits = [0.0; 3];
        critical_section::with(|cs| {
            conveyor.with_pending(cs, |_, pending| {
                for (i, block) in pending.iter().enumerate() {
                    entries[i] = block.entry_speed;
                    exits[i] = block.exit_speed;
                }
            })
        });

        assert_eq!(entries[0], 0.0);
        assert!((entries[1] - junction).abs() < 0.1);
        assert!((entries[2] - junction).abs() < 0.1);
        assert!((exits[0] - entries[1]).abs() < 1e-3);
        assert!((exits[1] - entries[2]).abs() < 1e-3);
        assert_eq!(exits[2], 0.0);
    }

    #[test]
    fn test_reversal_stops_at_junction() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        planner.plan(&conveyor, [1000.0, 0.0, 0.0], 500.0).unwrap();
        let back = planner.plan(&conveyor, [0.0, 0.0, 0.0], 500.0).unwrap();

        assert_eq!(back.max_entry_speed, 0.0);
        assert_eq!(back.entry_speed, 0.0);
    }

    #[test]
    fn test_active_block_untouched() {
        let mut planner = planner();
        let conveyor: Conveyor<8> = Conveyor::new();

        planner.plan(&conveyor, [1000.0, 0.0, 0.0], 500.0).unwrap();
        let claim = conveyor.peek_front().unwrap();

        let next = planner.plan(&conveyor, [2000.0, 0.0, 0.0], 500.0).unwrap();

        // The executing block decelerates to rest, so the next one starts there
        assert_eq!(next.entry_speed, 0.0);
        let head = conveyor.peek_front().unwrap();
        assert_eq!(head.block, claim.block);
    }

    #[test]
    fn test_lookahead_records_clamp() {
        // Pinned entry of 60 mm/s cannot stop within 10 mm at 100 mm/s²
        let mut head = Block::new([10, 0, 0], AxisMask::empty(), 10.0, 1000.0, 100.0, 0.0);
        head.calculate_trapezoid(60.0, 60.0);
        assert!(head.fit.is_feasible());
        let mut reversal = Block::new([10, 0, 0], AxisMask::X, 10.0, 1000.0, 100.0, 0.0);

        recalculate(&mut [&mut head, &mut reversal], 1000.0);

        assert!(matches!(
            head.fit,
            ProfileFit::EntryClamped { requested, .. } if requested == 60.0
        ));
        assert!(head.entry_speed < 45.0);
        assert!(reversal.fit.is_feasible());
        assert!(head.is_prepared_for(1000.0));
    }

    #[test]
    fn test_sync_position_forgets_previous() {
        let mut planner = planner();
        planner.sync_position([5, 6, 7]);

        assert_eq!(planner.position(), [5, 6, 7]);
        let mm = planner.position_mm();
        assert_eq!(mm, [5.0, 6.0, 7.0]);
    }
}
