//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::MachineConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
///
/// ```rust,ignore
/// use step_conveyor::load_config;
///
/// let config = load_config("machine.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = truncated(&e.to_string());
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(content)
        .map_err(|e| Error::Config(ConfigError::ParseError(truncated(e.message()))))?;

    super::validation::validate_config(&config)?;

    info!(
        "loaded machine config: {} Hz tick, junction deviation {} mm",
        config.ticker.frequency_hz,
        config.planner.junction_deviation_mm
    );

    Ok(config)
}

fn truncated(msg: &str) -> heapless::String<128> {
    let mut out = heapless::String::new();
    for c in msg.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const AXES: &str = r#"
[axes.x]
steps_per_mm = 80.0
max_rate_mm_per_sec = 200.0
acceleration_mm_per_sec2 = 1500.0

[axes.y]
steps_per_mm = 80.0
max_rate_mm_per_sec = 200.0
acceleration_mm_per_sec2 = 1500.0

[axes.z]
steps_per_mm = 400.0
max_rate_mm_per_sec = 10.0
acceleration_mm_per_sec2 = 100.0
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(AXES).unwrap();

        assert_eq!(config.axes.z.steps_per_mm, 400.0);
        assert_eq!(config.ticker.frequency_hz, 100_000.0);
        assert_eq!(config.idle.lock_time_secs, 25);
    }

    #[test]
    fn test_parse_with_overrides() {
        let toml = format!(
            r#"
[ticker]
frequency_hz = 50000.0
dir_inversion_mask = 5

[planner]
junction_deviation_mm = 0.02
{}"#,
            AXES
        );

        let config = parse_config(&toml).unwrap();
        assert_eq!(config.ticker.frequency_hz, 50_000.0);
        assert_eq!(config.ticker.dir_inversion_mask, 5);
        assert_eq!(config.planner.junction_deviation_mm, 0.02);
        assert_eq!(config.planner.minimum_step_rate, 20.0);
    }

    #[test]
    fn test_parse_missing_axes() {
        let result = parse_config("[ticker]\nfrequency_hz = 1000.0\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/machine.toml");
        assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
    }
}
