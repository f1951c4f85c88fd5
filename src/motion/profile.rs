//! Trapezoidal velocity profile math.
//!
//! Boundaries are computed in the lead-axis step domain: speeds in steps/s,
//! acceleration in steps/s², positions in steps. A profile accelerates from the
//! entry rate, cruises at the nominal rate and decelerates to the exit rate. A
//! move too short to reach nominal collapses to a triangle.

use libm::{ceilf, roundf, sqrtf};

/// Relative slack before an out-of-reach speed is reported as clamped.
const CLAMP_TOLERANCE: f32 = 1e-4;

/// Current phase of block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Ramping up from the entry rate.
    Accelerating,
    /// Running at the nominal rate.
    Cruising,
    /// Ramping down toward the exit rate.
    Decelerating,
    /// Every step of the block has been emitted.
    Complete,
}

/// Outcome of fitting a profile to requested boundary speeds.
///
/// Infeasible requests are recomputed, never rejected. Speeds are in mm/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileFit {
    /// Both boundary speeds were reachable.
    Feasible,
    /// Entry was too fast to slow down to the exit speed within the block.
    EntryClamped {
        /// Entry speed asked for.
        requested: f32,
        /// Entry speed used.
        applied: f32,
    },
    /// Exit was too fast to reach from the entry speed within the block.
    ExitClamped {
        /// Exit speed asked for.
        requested: f32,
        /// Exit speed used.
        applied: f32,
    },
}

impl ProfileFit {
    /// Check if no speed had to be changed.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        matches!(self, ProfileFit::Feasible)
    }
}

/// Step-domain trapezoid for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Trapezoid {
    pub entry: f32,
    pub exit: f32,
    pub accelerate_until: u32,
    pub decelerate_after: u32,
}

/// Which boundary, if any, was lowered by [`fit_trapezoid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clamp {
    None,
    Entry,
    Exit,
}

/// Fit a trapezoid over `steps` lead-axis steps.
///
/// `entry`, `exit` and `nominal` are step rates, `accel` is in steps/s².
pub(crate) fn fit_trapezoid(
    steps: u32,
    entry: f32,
    exit: f32,
    nominal: f32,
    accel: f32,
) -> (Trapezoid, Clamp) {
    let n = steps as f32;
    let mut entry = entry.clamp(0.0, nominal);
    let mut exit = exit.clamp(0.0, nominal);
    let reach = 2.0 * accel * n;
    let mut clamp = Clamp::None;

    // Entry must be able to decelerate to exit, and exit must be reachable from entry
    let entry_bound = sqrtf(exit * exit + reach);
    if entry > entry_bound {
        if entry > entry_bound * (1.0 + CLAMP_TOLERANCE) {
            clamp = Clamp::Entry;
        }
        entry = entry_bound;
    }
    let exit_bound = sqrtf(entry * entry + reach);
    if exit > exit_bound {
        if exit > exit_bound * (1.0 + CLAMP_TOLERANCE) {
            clamp = Clamp::Exit;
        }
        exit = exit_bound;
    }

    let accel_steps = (nominal * nominal - entry * entry) / (2.0 * accel);
    let decel_steps = (nominal * nominal - exit * exit) / (2.0 * accel);

    let (accelerate_until, decelerate_after) = if accel_steps + decel_steps > n {
        // Triangle: the ramps meet where both reach the same speed
        let peak = ((reach + exit * exit - entry * entry) / (4.0 * accel)).clamp(0.0, n);
        let peak = roundf(peak) as u32;
        (peak, peak)
    } else {
        let until = (ceilf(accel_steps) as u32).min(steps);
        let after = steps.saturating_sub(ceilf(decel_steps) as u32);
        (until, after.max(until))
    };

    (
        Trapezoid {
            entry,
            exit,
            accelerate_until,
            decelerate_after,
        },
        clamp,
    )
}

/// Lead-axis step rate at step index `step` of a fitted trapezoid.
pub(crate) fn rate_at(
    trapezoid: &Trapezoid,
    steps: u32,
    nominal: f32,
    accel: f32,
    step: u32,
) -> f32 {
    let s = step.min(steps) as f32;
    let remaining = steps as f32 - s;
    let up = sqrtf(trapezoid.entry * trapezoid.entry + 2.0 * accel * s);
    let down = sqrtf(trapezoid.exit * trapezoid.exit + 2.0 * accel * remaining);
    up.min(nominal).min(down)
}

/// Phase at a lead-axis step index.
#[inline]
pub(crate) fn phase_at(
    accelerate_until: u32,
    decelerate_after: u32,
    steps: u32,
    step: u32,
) -> MotionPhase {
    if step >= steps {
        MotionPhase::Complete
    } else if step < accelerate_until {
        MotionPhase::Accelerating
    } else if step < decelerate_after {
        MotionPhase::Cruising
    } else {
        MotionPhase::Decelerating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_trapezoid() {
        // 0 -> 1000 steps/s at 2000 steps/s² needs 250 steps each way
        let (t, clamp) = fit_trapezoid(1000, 0.0, 0.0, 1000.0, 2000.0);

        assert_eq!(clamp, Clamp::None);
        assert_eq!(t.accelerate_until, 250);
        assert_eq!(t.decelerate_after, 750);
        let phase = |step| phase_at(t.accelerate_until, t.decelerate_after, 1000, step);
        assert_eq!(phase(100), MotionPhase::Accelerating);
        assert_eq!(phase(500), MotionPhase::Cruising);
        assert_eq!(phase(900), MotionPhase::Decelerating);
        assert_eq!(phase(1000), MotionPhase::Complete);
    }

    #[test]
    fn test_triangle_profile() {
        let (t, _) = fit_trapezoid(100, 0.0, 0.0, 10000.0, 1000.0);

        assert_eq!(t.accelerate_until, 50);
        assert_eq!(t.accelerate_until, t.decelerate_after);
        assert_eq!(
            phase_at(t.accelerate_until, t.decelerate_after, 100, 50),
            MotionPhase::Decelerating
        );
    }

    #[test]
    fn test_asymmetric_triangle() {
        // Entry 100, exit 0: the peak shifts toward the end
        let (t, _) = fit_trapezoid(100, 100.0, 0.0, 10000.0, 1000.0);
        assert_eq!(t.accelerate_until, 48);
    }

    #[test]
    fn test_entry_clamped() {
        // 10 steps at 100 steps/s² cannot shed 500 steps/s
        let (t, clamp) = fit_trapezoid(10, 500.0, 0.0, 1000.0, 100.0);

        assert_eq!(clamp, Clamp::Entry);
        assert!((t.entry - sqrtf(2000.0)).abs() < 1e-3);
        assert_eq!(t.accelerate_until, 0);
        assert_eq!(t.decelerate_after, 0);
    }

    #[test]
    fn test_exit_clamped() {
        let (t, clamp) = fit_trapezoid(10, 0.0, 500.0, 1000.0, 100.0);

        assert_eq!(clamp, Clamp::Exit);
        assert!((t.exit - sqrtf(2000.0)).abs() < 1e-3);
        assert_eq!(t.accelerate_until, 10);
    }

    #[test]
    fn test_rate_endpoints() {
        let (t, _) = fit_trapezoid(400, 50.0, 80.0, 300.0, 500.0);

        assert!((rate_at(&t, 400, 300.0, 500.0, 0) - 50.0).abs() < 1e-3);
        assert!((rate_at(&t, 400, 300.0, 500.0, 400) - 80.0).abs() < 1e-3);
        assert!((rate_at(&t, 400, 300.0, 500.0, 200) - 300.0).abs() < 1e-3);
    }
}
