//! Error types for step-conveyor.
//!
//! Provides unified error handling across configuration, hardware I/O, motion planning
//! and the block queue. Nothing in the interrupt path returns these; they are reported
//! to the foreground caller only.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all step-conveyor operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Stepper driver I/O error
    Motor(MotorError),
    /// Motion planning error
    Motion(MotionError),
    /// Block queue error
    Queue(QueueError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps per millimeter must be > 0
    InvalidStepsPerMm {
        /// Axis index
        axis: usize,
        /// Configured value
        value: f32,
    },
    /// Maximum rate must be > 0
    InvalidMaxRate {
        /// Axis index
        axis: usize,
        /// Configured value
        value: f32,
    },
    /// Acceleration must be > 0
    InvalidAcceleration {
        /// Axis index
        axis: usize,
        /// Configured value
        value: f32,
    },
    /// Junction deviation must be >= 0
    InvalidJunctionDeviation(f32),
    /// Minimum speeds and rates must be >= 0
    InvalidMinimumSpeed(f32),
    /// Tick frequency must be > 0 and below the timer clock
    InvalidFrequency(f32),
    /// Step pulse width must fit inside one tick period
    InvalidUnstepTime(u8),
    /// Inversion mask has bits beyond the configured axes
    InvalidMask(u8),
    /// A required builder field was not provided
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Stepper driver I/O errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MotorError {
    /// Pin operation failed
    PinError,
    /// Axis index out of range
    InvalidAxis(usize),
}

/// Motion planning errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Feed rate must be finite and > 0
    InvalidFeedRate(f32),
    /// Move too short to produce a single step
    MoveTooShort {
        /// Requested move in steps (lead axis)
        steps: i64,
        /// Minimum required steps
        minimum: i64,
    },
    /// Target is not finite, or too far from the current position for one block
    TargetOutOfRange {
        /// Axis index (X = 0)
        axis: usize,
        /// Requested target in mm
        target_mm: f32,
    },
    /// Machine is halted; motion is refused until the halt is cleared
    Halted,
}

/// Block queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The conveyor ring buffer is at capacity
    Full,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Queue(e) => write!(f, "Queue error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Invalid steps/mm on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxRate { axis, value } => {
                write!(f, "Invalid max rate on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidAcceleration { axis, value } => {
                write!(f, "Invalid acceleration on axis {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be >= 0", v)
            }
            ConfigError::InvalidMinimumSpeed(v) => {
                write!(f, "Invalid minimum speed: {}. Must be >= 0", v)
            }
            ConfigError::InvalidFrequency(v) => write!(f, "Invalid tick frequency: {} Hz", v),
            ConfigError::InvalidUnstepTime(v) => {
                write!(f, "Invalid step pulse width: {} us does not fit in one tick", v)
            }
            ConfigError::InvalidMask(v) => write!(f, "Invalid axis mask: {:#04x}", v),
            ConfigError::MissingField(name) => write!(f, "{} is required", name),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
            MotorError::InvalidAxis(axis) => write!(f, "Axis {} out of range", axis),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::InvalidFeedRate(v) => write!(f, "Invalid feed rate {}", v),
            MotionError::MoveTooShort { steps, minimum } => {
                write!(f, "Move of {} steps too short, minimum is {}", steps, minimum)
            }
            MotionError::TargetOutOfRange { axis, target_mm } => {
                write!(f, "Target {} mm out of range on axis {}", target_mm, axis)
            }
            MotionError::Halted => write!(f, "Machine is halted"),
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "Block queue is full"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotorError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err: Error = QueueError::Full.into();
        assert_eq!(format!("{}", err), "Queue error: Block queue is full");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidStepsPerMm { axis: 1, value: -2.0 };
        assert_eq!(format!("{}", err), "Invalid steps/mm on axis 1: -2. Must be > 0");
    }
}
