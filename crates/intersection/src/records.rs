//! Ephemeral records produced by one ingest or tick call.
//!
//! The controller hands these back to the caller and to notification sinks;
//! it never keeps them.

use serde::{Deserialize, Serialize};

use crate::lanes::Phase;
use crate::Millis;

/// Why a phase transition was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionReason {
    MinGreenElapsed,
    MaxGreenElapsed,
    MaxRedOverdue,
    PreparingForGreen,
    YellowElapsed,
}

impl TransitionReason {
    pub fn label(self) -> &'static str {
        match self {
            TransitionReason::MinGreenElapsed => "min-green-elapsed",
            TransitionReason::MaxGreenElapsed => "max-green-elapsed",
            TransitionReason::MaxRedOverdue => "max-red-overdue",
            TransitionReason::PreparingForGreen => "preparing-for-green",
            TransitionReason::YellowElapsed => "yellow-elapsed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChangeRecord {
    pub lane_id: String,
    pub previous: Phase,
    pub next: Phase,
    /// When the previous phase began.
    pub started_at: Millis,
    pub ended_at: Millis,
    pub duration_ms: Millis,
    pub reason: TransitionReason,
}

/// A closed vehicle-presence interval on one lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub lane_id: String,
    pub detected_at: Millis,
    pub cleared_at: Millis,
    pub wait_ms: Millis,
    /// The lane was given green while this interval was open.
    pub triggered_change: bool,
}
