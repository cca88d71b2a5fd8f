// ---------------------------------------------------------------------------
// Typed errors for configuration, sensor ingestion and replay files
// ---------------------------------------------------------------------------

use std::fmt;

use crate::Millis;

/// Reasons a `SignalConfig` is refused by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Fewer than two lanes leaves nothing to hand green over to.
    TooFewLanes(usize),
    EmptyLaneId,
    DuplicateLane(String),
    /// A sensor points at a lane that is not in the lane list.
    UnknownSensorLane { sensor: String, lane: String },
    InvalidThreshold(f64),
    GreenBoundsInverted {
        min_green_ms: u64,
        max_green_ms: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewLanes(n) => {
                write!(f, "at least 2 lanes are required, got {n}")
            }
            ConfigError::EmptyLaneId => write!(f, "lane identifiers must not be empty"),
            ConfigError::DuplicateLane(lane) => write!(f, "lane '{lane}' is listed twice"),
            ConfigError::UnknownSensorLane { sensor, lane } => {
                write!(f, "sensor '{sensor}' maps to unknown lane '{lane}'")
            }
            ConfigError::InvalidThreshold(cm) => {
                write!(f, "detection threshold must be a finite, non-negative distance (got {cm})")
            }
            ConfigError::GreenBoundsInverted {
                min_green_ms,
                max_green_ms,
            } => write!(
                f,
                "min green ({min_green_ms} ms) exceeds max green ({max_green_ms} ms)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validation failures for an inbound sensor event. Raised before any lane
/// state is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    MissingDeviceId,
    /// `sensors` was absent or not a JSON object.
    ReadingsNotMapping,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::MissingDeviceId => write!(f, "device_id is required"),
            IngestError::ReadingsNotMapping => {
                write!(f, "sensors must be an object of sensor id -> reading")
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// Failures loading, checking or re-running a replay file.
#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    Decode(String),
    UnsupportedVersion { found: u32, expected: u32 },
    EntryCountMismatch { declared: u64, found: usize },
    /// Entry `index` is timestamped before the entry preceding it.
    OutOfOrder { index: usize, previous: Millis, at: Millis },
    InvalidConfig(ConfigError),
    DigestMismatch { expected: u32, actual: u32 },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "replay I/O error: {e}"),
            ReplayError::Decode(msg) => write!(f, "replay decode error: {msg}"),
            ReplayError::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported replay format version {found} (expected {expected})"
            ),
            ReplayError::EntryCountMismatch { declared, found } => write!(
                f,
                "entry count mismatch: footer says {declared} but found {found} entries"
            ),
            ReplayError::OutOfOrder {
                index,
                previous,
                at,
            } => write!(
                f,
                "entry {index} at {at} ms precedes the previous entry at {previous} ms"
            ),
            ReplayError::InvalidConfig(e) => write!(f, "replay carries an invalid config: {e}"),
            ReplayError::DigestMismatch { expected, actual } => write!(
                f,
                "final state digest mismatch: recorded {expected:08x}, replayed {actual:08x}"
            ),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Io(e) => Some(e),
            ReplayError::InvalidConfig(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

impl From<ConfigError> for ReplayError {
    fn from(e: ConfigError) -> Self {
        ReplayError::InvalidConfig(e)
    }
}
