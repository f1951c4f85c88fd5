//! Machine configuration - root configuration structure.

use serde::Deserialize;

use super::axis::AxesConfig;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Step interrupt timing and pin polarity.
    #[serde(default)]
    pub ticker: TickerConfig,

    /// Look-ahead planner tuning.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Stepper idle-lock behavior.
    #[serde(default)]
    pub idle: IdleConfig,

    /// Fault and limit input polarity.
    #[serde(default)]
    pub inputs: InputConfig,

    /// Per-axis mechanics.
    pub axes: AxesConfig,
}

impl MachineConfig {
    /// Create a configuration with default timing, planner and idle settings.
    pub fn new(axes: AxesConfig) -> Self {
        Self {
            ticker: TickerConfig::default(),
            planner: PlannerConfig::default(),
            idle: IdleConfig::default(),
            inputs: InputConfig::default(),
            axes,
        }
    }
}

/// Step interrupt configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// Step interrupt rate in ticks per second.
    #[serde(default = "default_frequency")]
    pub frequency_hz: f32,

    /// Clock feeding the step timer, used to derive the timer period.
    #[serde(default = "default_timer_clock")]
    pub timer_clock_hz: u32,

    /// Minimum step pulse width in microseconds.
    #[serde(default = "default_unstep_time")]
    pub unstep_time_us: u8,

    /// Axes whose step pin is active low.
    #[serde(default)]
    pub step_inversion_mask: u8,

    /// Axes whose direction pin is inverted.
    #[serde(default)]
    pub dir_inversion_mask: u8,

    /// Driver enable line is active low.
    #[serde(default = "default_true")]
    pub enable_active_low: bool,

    /// Driver reset line is active low.
    #[serde(default = "default_true")]
    pub reset_active_low: bool,
}

fn default_frequency() -> f32 {
    100_000.0
}

fn default_timer_clock() -> u32 {
    84_000_000
}

fn default_unstep_time() -> u8 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency(),
            timer_clock_hz: default_timer_clock(),
            unstep_time_us: default_unstep_time(),
            step_inversion_mask: 0,
            dir_inversion_mask: 0,
            enable_active_low: true,
            reset_active_low: true,
        }
    }
}

/// Look-ahead planner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Allowed path deviation at a corner, in mm.
    #[serde(default = "default_junction_deviation")]
    pub junction_deviation_mm: f32,

    /// Junction speed used when a move reverses direction, in mm/s.
    #[serde(default)]
    pub minimum_planner_speed: f32,

    /// Slowest pulse rate the step generator will run at, in steps/s.
    #[serde(default = "default_minimum_step_rate")]
    pub minimum_step_rate: f32,
}

fn default_junction_deviation() -> f32 {
    0.05
}

fn default_minimum_step_rate() -> f32 {
    20.0
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            junction_deviation_mm: default_junction_deviation(),
            minimum_planner_speed: 0.0,
            minimum_step_rate: default_minimum_step_rate(),
        }
    }
}

/// Stepper idle-lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleConfig {
    /// Seconds without motion before the drivers are de-energized.
    #[serde(default = "default_lock_time")]
    pub lock_time_secs: u32,
}

fn default_lock_time() -> u32 {
    25
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            lock_time_secs: default_lock_time(),
        }
    }
}

impl IdleConfig {
    /// Idle-lock delay in milliseconds.
    pub fn lock_time_ms(&self) -> u64 {
        self.lock_time_secs as u64 * 1000
    }
}

/// Fault and limit input polarity.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Global driver fault line reads low on fault.
    #[serde(default = "default_true")]
    pub fault_active_low: bool,

    /// Limit switches read high when tripped.
    #[serde(default = "default_true")]
    pub limit_active_high: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            fault_active_low: true,
            limit_active_high: true,
        }
    }
}
