//! Read-only views of controller state for transports and dashboards.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::SignalConfig;
use crate::lanes::{LaneState, Phase};
use crate::Millis;

/// Connectivity flags supplied by the host. The controller only echoes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Connectivity {
    pub database_connected: bool,
    pub device_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct LaneSnapshot {
    pub id: String,
    pub phase: Phase,
    pub last_change_at: Millis,
    pub last_vehicle_at: Option<Millis>,
    pub last_sample_at: Option<Millis>,
    pub last_distance_cm: Option<f64>,
    pub is_occupied: bool,
    pub last_cleared_at: Option<Millis>,
    pub waiting: bool,
    pub cycles_completed: u32,
    pub red_since: Option<Millis>,
}

impl LaneSnapshot {
    pub fn capture(lane: &LaneState, waiting: bool) -> Self {
        Self {
            id: lane.id.clone(),
            phase: lane.phase,
            last_change_at: lane.last_change_at,
            last_vehicle_at: lane.last_vehicle_at,
            last_sample_at: lane.last_sample_at,
            last_distance_cm: lane.last_distance_cm,
            is_occupied: lane.is_occupied,
            last_cleared_at: lane.last_cleared_at,
            waiting,
            cycles_completed: lane.cycles_completed,
            red_since: lane.red_since,
        }
    }
}

/// Whole-intersection view. Lanes are in configured order; the queue keeps
/// its service order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct IntersectionSnapshot {
    /// Time of the last ingest, tick or reset the controller processed.
    pub timestamp: Millis,
    pub current_lane: String,
    pub next_lane: Option<String>,
    pub lanes: Vec<LaneSnapshot>,
    pub queue: Vec<String>,
    pub config: SignalConfig,
    #[serde(flatten)]
    pub connectivity: Connectivity,
}

impl IntersectionSnapshot {
    pub fn lane(&self, id: &str) -> Option<&LaneSnapshot> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    /// Lanes currently showing `phase`.
    pub fn lanes_in(&self, phase: Phase) -> impl Iterator<Item = &LaneSnapshot> {
        self.lanes.iter().filter(move |lane| lane.phase == phase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub lanes: usize,
    pub queue: usize,
}
