//! Configuration validation.
//!
//! Checks every known section before a command runs. Missing keys are fine
//! (defaults apply); present keys must parse and be in range.

use crate::domain::error::MetalwatchError;
use crate::domain::forecast::MAX_HORIZON;
use crate::ports::config_port::ConfigPort;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    validate_storage(config)?;
    validate_history(config)?;
    validate_quota(config, "price_feed")?;
    validate_quota(config, "commentary")?;
    validate_forecast(config)?;
    validate_analysis(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> MetalwatchError {
    MetalwatchError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Present keys must parse as an integer of at least `min`.
fn check_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    min: i64,
) -> Result<Option<i64>, MetalwatchError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, format!("{key} must be an integer, got {raw:?}")))?;
    if value < min {
        return Err(invalid(section, key, format!("{key} must be at least {min}")));
    }
    Ok(Some(value))
}

fn validate_storage(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    if let Some(backend) = config.get_string("storage", "backend") {
        match backend.trim().to_lowercase().as_str() {
            "sqlite" | "json" => {}
            other => {
                return Err(invalid(
                    "storage",
                    "backend",
                    format!("backend must be sqlite or json, got {other:?}"),
                ));
            }
        }
    }
    if let Some(path) = config.get_string("storage", "path") {
        if path.trim().is_empty() {
            return Err(invalid("storage", "path", "path must not be empty"));
        }
    }
    Ok(())
}

fn validate_history(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    check_int(config, "history", "capacity", 1)?;
    Ok(())
}

fn validate_quota(config: &dyn ConfigPort, section: &str) -> Result<(), MetalwatchError> {
    check_int(config, section, "requests_per_window", 1)?;
    check_int(config, section, "window_minutes", 1)?;
    Ok(())
}

fn validate_forecast(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    check_int(config, "forecast", "training_window", 1)?;
    let horizon = check_int(config, "forecast", "horizon", 1)?;
    if horizon.is_some_and(|h| h > MAX_HORIZON as i64) {
        return Err(invalid(
            "forecast",
            "horizon",
            format!("horizon must be at most {MAX_HORIZON}"),
        ));
    }

    if let Some(raw) = config.get_string("forecast", "band_multiplier") {
        let value: f64 = raw.trim().parse().map_err(|_| {
            invalid(
                "forecast",
                "band_multiplier",
                format!("band_multiplier must be a number, got {raw:?}"),
            )
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(
                "forecast",
                "band_multiplier",
                "band_multiplier must be finite and non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_analysis(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    check_int(config, "analysis", "min_points", 1)?;
    check_int(config, "analysis", "rsi_period", 1)?;
    let short = check_int(config, "analysis", "sma_short", 1)?.unwrap_or(20);
    let long = check_int(config, "analysis", "sma_long", 1)?.unwrap_or(50);
    if short >= long {
        return Err(invalid(
            "analysis",
            "sma_short",
            "sma_short must be less than sma_long",
        ));
    }
    Ok(())
}

fn validate_logging(config: &dyn ConfigPort) -> Result<(), MetalwatchError> {
    match config.get_string("logging", "level") {
        Some(level) if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) => {
            Err(invalid(
                "logging",
                "level",
                format!("level must be one of {}", LOG_LEVELS.join(", ")),
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[storage]
backend = json
path = ./data

[history]
capacity = 1000

[price_feed]
requests_per_window = 7
window_minutes = 60

[commentary]
requests_per_window = 1
window_minutes = 60
command = cat

[forecast]
training_window = 90
band_multiplier = 1.5
horizon = 7

[analysis]
min_points = 50
sma_short = 20
sma_long = 50
rsi_period = 14

[logging]
level = debug
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert!(validate_config(&make_config("")).is_ok());
    }

    #[test]
    fn unknown_backend_fails() {
        let config = make_config("[storage]\nbackend = postgres\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn zero_capacity_fails() {
        let config = make_config("[history]\ncapacity = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "capacity"));
    }

    #[test]
    fn non_numeric_capacity_fails() {
        let config = make_config("[history]\ncapacity = lots\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "capacity"));
    }

    #[test]
    fn zero_quota_fails() {
        let config = make_config("[commentary]\nrequests_per_window = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            MetalwatchError::ConfigInvalid { section, key, .. }
                if section == "commentary" && key == "requests_per_window"
        ));
    }

    #[test]
    fn zero_window_fails() {
        let config = make_config("[price_feed]\nwindow_minutes = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "window_minutes"));
    }

    #[test]
    fn negative_band_multiplier_fails() {
        let config = make_config("[forecast]\nband_multiplier = -1\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "band_multiplier")
        );
    }

    #[test]
    fn zero_horizon_fails() {
        let config = make_config("[forecast]\nhorizon = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "horizon"));
    }

    #[test]
    fn oversized_horizon_fails() {
        let config = make_config("[forecast]\nhorizon = 100000\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "horizon"));
    }

    #[test]
    fn inverted_sma_periods_fail() {
        let config = make_config("[analysis]\nsma_short = 60\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "sma_short"));
    }

    #[test]
    fn unknown_log_level_fails() {
        let config = make_config("[logging]\nlevel = loud\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, MetalwatchError::ConfigInvalid { key, .. } if key == "level"));
    }
}
