//! Startup settings for `signalctl`.
//!
//! A JSON file (`--config`) provides the base configuration; environment
//! variables override individual fields. Values that are present but do not
//! parse are errors rather than silent defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use intersection::signal_plugin::DEFAULT_TICK_INTERVAL;
use intersection::{ConfigError, SignalConfig};
use serde::Deserialize;

/// Accepted range for the periodic evaluation cadence.
pub const TICK_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=500;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config: SignalConfig,
    pub tick_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: SignalConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// On-disk shape: a `SignalConfig` plus the tick cadence.
#[derive(Deserialize)]
struct SettingsFile {
    #[serde(flatten)]
    config: SignalConfig,
    #[serde(default)]
    tick_interval_ms: Option<u64>,
}

#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    /// An environment variable held something that is not a number.
    InvalidValue { var: &'static str, value: String },
    TickIntervalOutOfRange(u64),
    Config(ConfigError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            SettingsError::Parse { path, source } => {
                write!(f, "invalid settings file {}: {source}", path.display())
            }
            SettingsError::InvalidValue { var, value } => {
                write!(f, "{var}={value:?} is not a valid number")
            }
            SettingsError::TickIntervalOutOfRange(ms) => write!(
                f,
                "tick interval {ms} ms is outside {}..={} ms",
                TICK_INTERVAL_RANGE_MS.start(),
                TICK_INTERVAL_RANGE_MS.end()
            ),
            SettingsError::Config(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io { source, .. } => Some(source),
            SettingsError::Parse { source, .. } => Some(source),
            SettingsError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SettingsError {
    fn from(e: ConfigError) -> Self {
        SettingsError::Config(e)
    }
}

impl Settings {
    /// Read the optional settings file, apply overrides from `lookup`, and
    /// validate the result.
    pub fn load(
        file: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(lookup)?;

        let interval_ms = settings.tick_interval.as_millis() as u64;
        if !TICK_INTERVAL_RANGE_MS.contains(&interval_ms) {
            return Err(SettingsError::TickIntervalOutOfRange(interval_ms));
        }
        settings.config.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SettingsFile =
            serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            config: file.config,
            tick_interval: file
                .tick_interval_ms
                .map_or(DEFAULT_TICK_INTERVAL, Duration::from_millis),
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        let config = &mut self.config;

        if let Some(cm) = parse_var(&lookup, "DETECTION_THRESHOLD_CM")? {
            config.detection_threshold_cm = cm;
        }
        let millis: [(&'static str, &mut u64); 7] = [
            ("PRESENCE_TIMEOUT_MS", &mut config.presence_timeout_ms),
            ("MIN_GREEN_MS", &mut config.min_green_ms),
            ("MAX_GREEN_MS", &mut config.max_green_ms),
            ("YELLOW_MS", &mut config.yellow_ms),
            ("MAX_RED_MS", &mut config.max_red_ms),
            ("HOLD_AFTER_CLEAR_MS", &mut config.hold_after_clear_ms),
            ("VEHICLE_PRESENCE_GRACE_MS", &mut config.vehicle_presence_grace_ms),
        ];
        for (var, field) in millis {
            if let Some(ms) = parse_var(&lookup, var)? {
                *field = ms;
            }
        }
        // Older deployments name the grace period after the gap it bridges.
        if let Some(ms) = parse_var(&lookup, "VEHICLE_GAP_HOLD_MS")? {
            config.vehicle_presence_grace_ms = ms;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "TICK_INTERVAL_MS")? {
            self.tick_interval = Duration::from_millis(ms);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, SettingsError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| SettingsError::InvalidValue { var, value })
}
