//! Step ticker shared between the foreground and interrupt handlers.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::hal::StepperIo;

use super::StepTicker;

/// Owner of the step ticker that both contexts borrow explicitly.
///
/// Place one in a `static` and install the ticker at startup; the timer
/// interrupt handlers and the foreground then reach it through
/// [`lock`](Self::lock), each access inside a critical section.
///
/// ```rust,ignore
/// static CONVEYOR: Conveyor<16> = Conveyor::new();
/// static TICKER: SharedTicker<Pins> = SharedTicker::new();
///
/// #[interrupt]
/// fn TIM2() {
///     TICKER.lock(|ticker| ticker.step_tick(&CONVEYOR));
/// }
/// ```
pub struct SharedTicker<IO: StepperIo> {
    inner: Mutex<RefCell<Option<StepTicker<IO>>>>,
}

impl<IO: StepperIo> Default for SharedTicker<IO> {
    fn default() -> Self {
        Self::new()
    }
}

impl<IO: StepperIo> SharedTicker<IO> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Create a slot holding `ticker`.
    pub fn with_ticker(ticker: StepTicker<IO>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Some(ticker))),
        }
    }

    /// Place the ticker in the slot, returning any previous one.
    pub fn install(&self, ticker: StepTicker<IO>) -> Option<StepTicker<IO>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(ticker))
    }

    /// Remove the ticker from the slot.
    pub fn take(&self) -> Option<StepTicker<IO>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the ticker inside a critical section.
    ///
    /// Returns `None` when no ticker is installed.
    pub fn lock<R>(&self, f: impl FnOnce(&mut StepTicker<IO>) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Check whether a ticker is installed.
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
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

    fn ticker() -> StepTicker<NullIo> {
        StepTicker::builder().io(NullIo).frequency(10_000.0).build().unwrap()
    }

    #[test]
    fn test_empty_slot() {
        static TICKER: SharedTicker<NullIo> = SharedTicker::new();

        assert!(!TICKER.is_installed());
        assert_eq!(TICKER.lock(|t| t.get_frequency()), None);
    }

    #[test]
    fn test_install_and_take() {
        let shared = SharedTicker::new();
        assert!(shared.install(ticker()).is_none());
        assert!(shared.is_installed());

        shared.lock(|t| t.start());
        assert_eq!(shared.lock(|t| t.is_running()), Some(true));

        let ticker = shared.take().unwrap();
        assert!(ticker.is_running());
        assert!(!shared.is_installed());
    }
}
