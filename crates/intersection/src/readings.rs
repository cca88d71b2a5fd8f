//! Inbound sensor data.
//!
//! `SensorEvent` is the loosely-typed shape a transport hands over (readings
//! as arbitrary JSON). Validation turns it into a `SensorBatch`, the typed
//! form the presence tracker and the replay recorder work with.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::Millis;

pub const DEFAULT_INTERSECTION_ID: &str = "default";

/// A raw reading as delivered by a field device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum RawReading {
    Number(f64),
    Text(String),
    /// `null`, booleans, arrays, objects: nothing usable.
    Missing,
}

impl RawReading {
    /// Distance in centimetres, or `None` when the reading carries no number.
    pub fn distance_cm(&self) -> Option<f64> {
        let value = match self {
            RawReading::Number(v) => *v,
            RawReading::Text(s) => s.trim().parse::<f64>().ok()?,
            RawReading::Missing => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<&serde_json::Value> for RawReading {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map_or(RawReading::Missing, RawReading::Number),
            serde_json::Value::String(s) => RawReading::Text(s.clone()),
            _ => RawReading::Missing,
        }
    }
}

/// One ingestion request as received from the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub intersection_id: Option<String>,
    /// Expected to be an object of sensor id -> reading.
    #[serde(default)]
    pub sensors: serde_json::Value,
    /// Device-side timestamp; falls back to the processing time.
    #[serde(default)]
    pub timestamp: Option<Millis>,
}

impl SensorEvent {
    pub fn new(device_id: &str, sensors: serde_json::Value) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            sensors,
            ..Default::default()
        }
    }

    /// Check required fields and extract the readings (sorted by sensor id).
    pub fn validate(&self) -> Result<SensorBatch, IngestError> {
        let device_id = match self.device_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(IngestError::MissingDeviceId),
        };
        let map = self
            .sensors
            .as_object()
            .ok_or(IngestError::ReadingsNotMapping)?;

        Ok(SensorBatch {
            device_id,
            intersection_id: self
                .intersection_id
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERSECTION_ID.to_string()),
            readings: map
                .iter()
                .map(|(sensor, raw)| (sensor.clone(), RawReading::from(raw)))
                .collect(),
            timestamp: self.timestamp,
        })
    }
}

/// Validated, typed ingestion input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SensorBatch {
    pub device_id: String,
    pub intersection_id: String,
    pub readings: Vec<(String, RawReading)>,
    pub timestamp: Option<Millis>,
}
