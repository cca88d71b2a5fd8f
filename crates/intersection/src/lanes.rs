//! Per-lane signal state.
//!
//! Lanes live in a fixed-size vector in configured order and are addressed by
//! index everywhere inside the crate. Identifiers only appear at the edges
//! (sensor mapping, snapshots, records).

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::Millis;

/// Signal phase of a single lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Green,
    Yellow,
    Red,
    /// Primed successor while the outgoing lane shows yellow.
    RedYellow,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Green => "green",
            Phase::Yellow => "yellow",
            Phase::Red => "red",
            Phase::RedYellow => "red_yellow",
        }
    }
}

/// Mutable facts for one lane. Owned by the controller; no logic here.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneState {
    pub id: String,
    pub phase: Phase,
    pub last_change_at: Millis,
    pub last_vehicle_at: Option<Millis>,
    pub last_sample_at: Option<Millis>,
    pub last_distance_cm: Option<f64>,
    pub is_occupied: bool,
    pub last_cleared_at: Option<Millis>,
    /// Set iff `phase == Red`.
    pub red_since: Option<Millis>,
    pub cycles_completed: u32,
    pub presence_started_at: Option<Millis>,
    pub presence_triggered_change: bool,
}

impl LaneState {
    pub fn new(id: &str, green: bool, now: Millis) -> Self {
        Self {
            id: id.to_string(),
            phase: if green { Phase::Green } else { Phase::Red },
            last_change_at: now,
            last_vehicle_at: None,
            last_sample_at: None,
            last_distance_cm: None,
            is_occupied: false,
            last_cleared_at: None,
            red_since: if green { None } else { Some(now) },
            cycles_completed: 0,
            presence_started_at: None,
            presence_triggered_change: false,
        }
    }

    #[inline]
    pub fn is_green(&self) -> bool {
        self.phase == Phase::Green
    }
}

/// Ordered lane storage. Created once per reset and never resized.
#[derive(Debug, Clone, Default)]
pub struct LaneStore {
    lanes: Vec<LaneState>,
}

impl LaneStore {
    /// Build the post-reset lane set: first lane green, the rest red.
    pub fn initial(ids: &[String], now: Millis) -> Self {
        Self {
            lanes: ids
                .iter()
                .enumerate()
                .map(|(i, id)| LaneState::new(id, i == 0, now))
                .collect(),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> &LaneState {
        &self.lanes[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut LaneState {
        &mut self.lanes[index]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.lanes.iter().position(|lane| lane.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LaneState> {
        self.lanes.iter()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}
