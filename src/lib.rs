//! # step-conveyor
//!
//! Real-time stepper motion core for CNC controllers, built on embedded-hal 1.0.
//!
//! ## Features
//!
//! - **Look-ahead planning**: junction-deviation cornering with backward and
//!   forward passes over the queued moves
//! - **Interrupt-safe queue**: a bounded conveyor between the planner and the
//!   step interrupt, guarded by `critical-section`
//! - **Fixed-point stepping**: the tick path uses 2.62 fixed-point accumulators
//!   and never touches floats or returns errors
//! - **no_std compatible**: Core library works without standard library
//! - **Configuration-driven**: Machine settings from TOML files on hosts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use step_conveyor::{Conveyor, MachineCore, SharedTicker, StepTicker};
//!
//! static CONVEYOR: Conveyor<16> = Conveyor::new();
//! static TICKER: SharedTicker<Pins> = SharedTicker::new();
//!
//! let config = step_conveyor::load_config("machine.toml")?;
//! TICKER.install(StepTicker::builder().io(pins).from_config(&config.ticker).build()?);
//!
//! let mut machine = MachineCore::new(&config, &CONVEYOR, &TICKER);
//! machine.initialize();
//! machine.finish_startup();
//! machine.plan([10.0, 5.0, 0.0], 50.0)?;
//!
//! // Step timer interrupt
//! TICKER.lock(|ticker| ticker.step_tick(&CONVEYOR));
//! // Unstep timer interrupt
//! TICKER.lock(|ticker| ticker.unstep_tick());
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O, TOML parsing and `log` output
//! - `log`: Log through the `log` facade
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod conveyor;
pub mod error;
pub mod hal;
pub mod machine;
pub mod motion;
pub mod planner;
pub mod ticker;

// Re-exports for ergonomic API
pub use config::{validate_config, MachineConfig, MechanicalConstraints, TickerConfig};
pub use conveyor::{Claim, Conveyor};
pub use error::{Error, Result};
pub use hal::{InputBank, InputEvents, PinBank, StepperIo};
pub use machine::{HaltReason, MachineCore, MachineState};
pub use motion::{AxisMask, Block, BlockExecutor, MotionPhase, ProfileFit, NUM_AXES};
pub use planner::Planner;
pub use ticker::{SharedTicker, StepTicker, StepTickerBuilder};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{MmPerSec, MmPerSecSquared};
