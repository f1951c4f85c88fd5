//! Configuration module for step-conveyor.
//!
//! Provides types for loading and validating machine configuration from TOML
//! files (with `std` feature) or building it in code.

mod axis;
mod machine;
mod mechanical;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxesConfig, AxisConfig};
pub use machine::{IdleConfig, InputConfig, MachineConfig, PlannerConfig, TickerConfig};
pub use mechanical::MechanicalConstraints;
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{MmPerSec, MmPerSecSquared};
