//! Junction speed between consecutive moves.

use libm::sqrtf;

use crate::motion::NUM_AXES;

/// Beyond this toward reverse the moves are treated as a full reversal.
const REVERSAL_COS: f32 = 0.95;

/// Direction and limits of one side of a junction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MoveVector {
    /// Unit direction of travel.
    pub unit: [f32; NUM_AXES],
    /// Cruise speed in mm/s.
    pub nominal_speed: f32,
    /// Path acceleration in mm/s².
    pub acceleration: f32,
}

/// Largest speed in mm/s at which `next` may start after `prev`.
///
/// Uses the approximated centripetal velocity bound: the corner is replaced by
/// an arc that deviates `deviation` mm from the sharp path, and the speed is the
/// one whose centripetal acceleration on that arc equals the move acceleration.
///
/// An axis whose direction flips at the junction must pass through zero, so the
/// path speed is further capped until that axis moves no faster than
/// `reversal_speed` on either side.
pub(crate) fn junction_speed(
    prev: &MoveVector,
    next: &MoveVector,
    deviation: f32,
    reversal_speed: f32,
) -> f32 {
    // cos of the angle between the incoming direction reversed and the outgoing one:
    // -1 for a straight line, +1 for a full reversal
    let cos_theta = -prev
        .unit
        .iter()
        .zip(next.unit.iter())
        .map(|(a, b)| a * b)
        .sum::<f32>();

    if cos_theta >= REVERSAL_COS {
        return reversal_speed.min(next.nominal_speed);
    }

    let mut speed = prev.nominal_speed.min(next.nominal_speed);

    let sin_theta_d2 = sqrtf((0.5 * (1.0 - cos_theta)).max(0.0));
    let one_minus = 1.0 - sin_theta_d2;
    if one_minus > 0.0 {
        let accel = prev.acceleration.min(next.acceleration);
        let v2 = accel * deviation * sin_theta_d2 / one_minus;
        speed = speed.min(sqrtf(v2));
    }

    for (a, b) in prev.unit.iter().zip(next.unit.iter()) {
        if a * b < 0.0 {
            let share = a.abs().max(b.abs());
            speed = speed.min(reversal_speed / share);
        }
    }

    speed
}
