//! Motion module for step-conveyor.
//!
//! Provides the planned move segment ([`Block`]), its trapezoidal velocity
//! profile and the fixed-point executor that walks it one tick at a time.

mod block;
mod executor;
mod profile;

use bitflags::bitflags;

pub use block::{Block, TickPlan};
pub use executor::BlockExecutor;
pub use profile::{MotionPhase, ProfileFit};

/// Number of machine axes (X, Y, Z).
pub const NUM_AXES: usize = 3;

/// X axis index.
pub const X_AXIS: usize = 0;
/// Y axis index.
pub const Y_AXIS: usize = 1;
/// Z axis index.
pub const Z_AXIS: usize = 2;

bitflags! {
    /// Set of axes, one bit per axis (bit 0 = X).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisMask: u8 {
        /// X axis.
        const X = 1 << X_AXIS;
        /// Y axis.
        const Y = 1 << Y_AXIS;
        /// Z axis.
        const Z = 1 << Z_AXIS;
    }
}

impl AxisMask {
    /// Mask with a single axis set.
    #[inline]
    pub const fn single(axis: usize) -> Self {
        Self::from_bits_truncate(1 << axis)
    }

    /// Check whether an axis index is in the set.
    #[inline]
    pub const fn contains_axis(self, axis: usize) -> bool {
        self.contains(Self::single(axis))
    }

    /// Add an axis index to the set.
    #[inline]
    pub fn insert_axis(&mut self, axis: usize) {
        self.insert(Self::single(axis));
    }

    /// Remove an axis index from the set.
    #[inline]
    pub fn remove_axis(&mut self, axis: usize) {
        self.remove(Self::single(axis));
    }

    /// Iterate over the axis indices in the set.
    pub fn axes(self) -> impl Iterator<Item = usize> {
        (0..NUM_AXES).filter(move |&axis| self.contains_axis(axis))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AxisMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AxisMask({=u8:#b})", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_mask_ops() {
        let mut mask = AxisMask::empty();
        mask.insert_axis(X_AXIS);
        mask.insert_axis(Z_AXIS);

        assert!(mask.contains_axis(X_AXIS));
        assert!(!mask.contains_axis(Y_AXIS));
        assert_eq!(mask, AxisMask::X | AxisMask::Z);

        mask.remove_axis(X_AXIS);
        assert_eq!(mask, AxisMask::single(Z_AXIS));
    }

    #[test]
    fn test_axis_mask_truncates() {
        assert_eq!(AxisMask::from_bits_truncate(0xFF), AxisMask::all());
        assert_eq!(AxisMask::all().axes().count(), NUM_AXES);
        assert_eq!(AxisMask::single(Y_AXIS).axes().next(), Some(Y_AXIS));
    }
}
