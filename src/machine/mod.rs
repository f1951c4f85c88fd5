//! Machine runtime: startup, idle lock and halt.
//!
//! [`MachineCore`] owns the [`Planner`] and borrows the [`Conveyor`] and the
//! [`SharedTicker`] that the interrupt handlers also use. It is driven from the
//! foreground: call [`MachineCore::on_idle`] from the main loop with a
//! millisecond timestamp and forward sampled [`InputEvents`] to
//! [`MachineCore::notify_of_event`].
//!
//! # Example
//!
//! ```rust,ignore
//! static CONVEYOR: Conveyor<16> = Conveyor::new();
//! static TICKER: SharedTicker<Pins> = SharedTicker::new();
//!
//! TICKER.install(StepTicker::builder().io(pins).from_config(&config.ticker).build()?);
//!
//! let mut machine = MachineCore::new(&config, &CONVEYOR, &TICKER);
//! machine.initialize();
//! delay.delay_ms(1);
//! machine.finish_startup();
//!
//! machine.plan([10.0, 0.0, 0.0], 50.0)?;
//! loop {
//!     machine.notify_of_event(inputs.sample()?);
//!     machine.on_idle(clock.now_ms());
//! }
//! ```

use crate::config::{MachineConfig, MechanicalConstraints};
use crate::conveyor::Conveyor;
use crate::error::{ConfigError, MotionError, Result};
use crate::hal::{InputEvents, StepperIo};
use crate::motion::{AxisMask, Block, NUM_AXES};
use crate::planner::Planner;
use crate::ticker::SharedTicker;

/// Why the machine halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HaltReason {
    /// Requested by the user or the host.
    User,
    /// The stepper drivers reported a fault.
    DriverFault,
    /// Limit switches tripped on these axes.
    Limit(AxisMask),
}

/// Machine safety state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MachineState {
    /// Drivers held in reset, waiting for [`MachineCore::finish_startup`].
    Startup,
    /// Accepting moves.
    Ready,
    /// Motion stopped until [`MachineCore::clear_halt`].
    Halted(HaltReason),
}

/// One-shot foreground timer on a caller-supplied millisecond clock.
#[derive(Debug, Clone, Copy)]
struct IdleTimer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl IdleTimer {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    fn start(&mut self, now_ms: u64) {
        if self.deadline.is_none() {
            self.deadline = Some(now_ms.saturating_add(self.delay_ms));
        }
    }

    fn stop(&mut self) {
        self.deadline = None;
    }

    fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm and report true once the deadline has passed.
    fn expired(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Composition root of the motion pipeline.
pub struct MachineCore<'a, IO: StepperIo, const N: usize> {
    planner: Planner,
    conveyor: &'a Conveyor<N>,
    ticker: &'a SharedTicker<IO>,
    idle_timer: IdleTimer,
    startup_finished: bool,
    state: MachineState,
}

impl<'a, IO: StepperIo, const N: usize> MachineCore<'a, IO, N> {
    /// Wire a planner for `config` to the shared conveyor and ticker.
    ///
    /// The configuration is expected to be validated already.
    pub fn new(
        config: &MachineConfig,
        conveyor: &'a Conveyor<N>,
        ticker: &'a SharedTicker<IO>,
    ) -> Self {
        Self {
            planner: Planner::new(MechanicalConstraints::from_config(config)),
            conveyor,
            ticker,
            idle_timer: IdleTimer::new(config.idle.lock_time_ms()),
            startup_finished: false,
            state: MachineState::Startup,
        }
    }

    /// Start the pipeline with the drivers held in reset.
    pub fn initialize(&mut self) {
        self.conveyor.start();
        self.ticker.lock(|ticker| {
            ticker.start();
            ticker.reset_stepper_drivers(true);
        });
        info!("machine initialized, drivers held in reset");
    }

    /// Release driver reset and start accepting moves.
    pub fn finish_startup(&mut self) {
        self.ticker.lock(|ticker| ticker.reset_stepper_drivers(false));
        self.startup_finished = true;
        if self.state == MachineState::Startup {
            self.state = MachineState::Ready;
        }
        info!("machine ready");
    }

    /// Plan a linear move and queue it.
    ///
    /// # Errors
    ///
    /// Returns `MotionError::Halted` while halted, otherwise whatever
    /// [`Planner::plan`] returns.
    pub fn plan(&mut self, target_mm: [f32; NUM_AXES], feed_rate: f32) -> Result<Block> {
        if let MachineState::Halted(_) = self.state {
            return Err(MotionError::Halted.into());
        }
        self.stop_stepper_idle_timer();
        self.planner.plan(self.conveyor, target_mm, feed_rate)
    }

    /// Change the step tick rate of the ticker and the planner together.
    ///
    /// The ticker switches at its next block boundary, or at once when idle.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFrequency` when either side rejects the
    /// rate; nothing is changed then.
    pub fn set_frequency(&mut self, frequency: f32) -> Result<()> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(ConfigError::InvalidFrequency(frequency).into());
        }
        self.ticker
            .lock(|ticker| ticker.set_frequency(frequency))
            .transpose()?;
        self.planner.set_step_frequency(self.conveyor, frequency)
    }

    /// Foreground housekeeping. Call regularly with a monotonic timestamp.
    ///
    /// Arms the idle-lock timer once motion has stopped with drivers still
    /// energized, disarms it while motion is pending, and releases the drivers
    /// when it expires.
    pub fn on_idle(&mut self, now_ms: u64) {
        if !self.startup_finished {
            return;
        }

        if !self.conveyor.on_idle() {
            self.stop_stepper_idle_timer();
            return;
        }

        let holding = self
            .ticker
            .lock(|ticker| ticker.are_drivers_enabled() || ticker.are_motors_still_moving())
            .unwrap_or(false);
        if holding {
            self.start_stepper_idle_timer(now_ms);
        }

        if self.idle_timer.expired(now_ms) {
            self.ticker.lock(|ticker| {
                ticker.enable_stepper_drivers(false);
                ticker.disable_all_motors();
            });
            info!("steppers idle, drivers released");
        }
    }

    /// Arm the idle-lock timer unless it is already running.
    pub fn start_stepper_idle_timer(&mut self, now_ms: u64) {
        self.idle_timer.start(now_ms);
    }

    /// Disarm the idle-lock timer.
    pub fn stop_stepper_idle_timer(&mut self) {
        self.idle_timer.stop();
    }

    /// Check whether the idle-lock timer is running.
    pub fn is_idle_timer_armed(&self) -> bool {
        self.idle_timer.is_armed()
    }

    /// Stop all motion at once.
    ///
    /// De-energizes the drivers, abandons the active block where it is, drops
    /// everything queued and re-syncs the planner to the position the machine
    /// actually reached. Does nothing if already halted.
    pub fn halt(&mut self, reason: HaltReason) {
        if let MachineState::Halted(_) = self.state {
            return;
        }

        let conveyor = self.conveyor;
        let position = self
            .ticker
            .lock(|ticker| {
                ticker.enable_stepper_drivers(false);
                ticker.disable_all_motors();
                ticker.abort();
                conveyor.flush_queue();
                ticker.position()
            })
            .unwrap_or_else(|| {
                conveyor.flush_queue();
                self.planner.position()
            });

        self.planner.sync_position(position);
        self.idle_timer.stop();
        self.state = MachineState::Halted(reason);

        match reason {
            HaltReason::User => info!("machine halted by request"),
            HaltReason::DriverFault => warn!("machine halted: stepper driver fault"),
            HaltReason::Limit(axes) => warn!("machine halted: limit on axes {}", axes.bits()),
        }
    }

    /// Turn sampled safety inputs into a halt.
    ///
    /// A driver fault takes precedence over limit switches. Returns true if
    /// this call halted the machine.
    pub fn notify_of_event(&mut self, events: InputEvents) -> bool {
        if let MachineState::Halted(_) = self.state {
            return false;
        }

        if events.contains(InputEvents::DRIVER_FAULT) {
            self.halt(HaltReason::DriverFault);
            return true;
        }

        let limits = events & InputEvents::LIMITS;
        if !limits.is_empty() {
            self.halt(HaltReason::Limit(AxisMask::from_bits_truncate(limits.bits())));
            return true;
        }

        false
    }

    /// Leave the halted state.
    pub fn clear_halt(&mut self) {
        if let MachineState::Halted(_) = self.state {
            self.state = if self.startup_finished {
                MachineState::Ready
            } else {
                MachineState::Startup
            };
            info!("halt cleared");
        }
    }

    /// Current safety state.
    #[inline]
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Check whether moves are refused.
    #[inline]
    pub fn is_halted(&self) -> bool {
        matches!(self.state, MachineState::Halted(_))
    }

    /// Get the planner.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Get the conveyor.
    pub fn conveyor(&self) -> &'a Conveyor<N> {
        self.conveyor
    }

    /// Get the shared ticker.
    pub fn ticker(&self) -> &'a SharedTicker<IO> {
        self.ticker
    }
}
