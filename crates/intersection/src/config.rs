//! Controller configuration.
//!
//! `SignalConfig` is an explicit value object handed to the controller at
//! construction. Nothing in this crate reads the process environment; the
//! binary is responsible for turning env vars or files into a config.

use std::collections::{BTreeMap, BTreeSet};

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Millis;

pub const DEFAULT_LANES: [&str; 4] = ["north", "west", "south", "east"];

pub const DEFAULT_SENSOR_MAP: [(&str, &str); 4] = [
    ("sensor1", "east"),
    ("sensor2", "south"),
    ("sensor3", "north"),
    ("sensor4", "west"),
];

/// Timing and sensing parameters for one intersection.
///
/// All durations are milliseconds. The lane list is ordered: the first lane
/// starts green after a reset and the order defines round-robin succession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(default)]
pub struct SignalConfig {
    pub lanes: Vec<String>,
    /// Sensor identifier -> lane identifier.
    pub sensor_map: BTreeMap<String, String>,
    /// A reading at or below this distance counts as a vehicle.
    pub detection_threshold_cm: f64,
    pub presence_timeout_ms: Millis,
    pub min_green_ms: Millis,
    pub max_green_ms: Millis,
    pub yellow_ms: Millis,
    /// A queued lane red for at least this long preempts the queue order.
    pub max_red_ms: Millis,
    pub hold_after_clear_ms: Millis,
    pub vehicle_presence_grace_ms: Millis,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES.iter().map(|l| l.to_string()).collect(),
            sensor_map: DEFAULT_SENSOR_MAP
                .iter()
                .map(|(sensor, lane)| (sensor.to_string(), lane.to_string()))
                .collect(),
            detection_threshold_cm: 13.6,
            presence_timeout_ms: 10_000,
            min_green_ms: 8_000,
            max_green_ms: 20_000,
            yellow_ms: 3_000,
            max_red_ms: 60_000,
            hold_after_clear_ms: 2_000,
            vehicle_presence_grace_ms: 4_000,
        }
    }
}

impl SignalConfig {
    /// Check the structural and numeric constraints the scheduler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes.len() < 2 {
            return Err(ConfigError::TooFewLanes(self.lanes.len()));
        }

        let mut seen = BTreeSet::new();
        for lane in &self.lanes {
            if lane.is_empty() {
                return Err(ConfigError::EmptyLaneId);
            }
            if !seen.insert(lane.as_str()) {
                return Err(ConfigError::DuplicateLane(lane.clone()));
            }
        }

        for (sensor, lane) in &self.sensor_map {
            if !seen.contains(lane.as_str()) {
                return Err(ConfigError::UnknownSensorLane {
                    sensor: sensor.clone(),
                    lane: lane.clone(),
                });
            }
        }

        if !self.detection_threshold_cm.is_finite() || self.detection_threshold_cm < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.detection_threshold_cm));
        }

        if self.min_green_ms > self.max_green_ms {
            return Err(ConfigError::GreenBoundsInverted {
                min_green_ms: self.min_green_ms,
                max_green_ms: self.max_green_ms,
            });
        }

        Ok(())
    }

    /// Position of `lane` in the configured order.
    pub fn lane_index(&self, lane: &str) -> Option<usize> {
        self.lanes.iter().position(|l| l == lane)
    }
}
