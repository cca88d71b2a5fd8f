//! Line protocol types for the headless `signalctl` driver.
//!
//! Each stdin line is one JSON command with a `"cmd"` discriminator. Each
//! stdout line is a JSON response carrying `"protocol_version"` and a
//! `"type"` tag. Announced snapshots are written as unsolicited
//! `traffic_state` lines between responses.
//!
//! The I/O loop lives in `crates/app/src/line_mode.rs`; the types live here
//! so they can be tested without the binary.

use serde::{Deserialize, Serialize};

use crate::controller::IngestOutcome;
use crate::readings::SensorEvent;
use crate::records::PhaseChangeRecord;
use crate::snapshot::{HealthSummary, IntersectionSnapshot, LaneSnapshot};
use crate::Millis;

// ---------------------------------------------------------------------------
// Commands (stdin -> controller)
// ---------------------------------------------------------------------------

/// The optional `at` fields set a manual clock; with a wall clock they are
/// ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd")]
pub enum SignalCommand {
    /// Feed one sensor event.
    #[serde(rename = "ingest")]
    Ingest {
        event: SensorEvent,
        #[serde(default)]
        at: Option<Millis>,
    },

    /// Run a time-driven evaluation now.
    #[serde(rename = "tick")]
    Tick {
        #[serde(default)]
        at: Option<Millis>,
    },

    #[serde(rename = "state")]
    State,

    #[serde(rename = "lane")]
    Lane { lane: String },

    #[serde(rename = "reset")]
    Reset {
        #[serde(default)]
        at: Option<Millis>,
    },

    #[serde(rename = "health")]
    Health,

    #[serde(rename = "quit")]
    Quit,
}

impl SignalCommand {
    /// Clock override carried by the command, if any.
    pub fn at(&self) -> Option<Millis> {
        match self {
            SignalCommand::Ingest { at, .. }
            | SignalCommand::Tick { at }
            | SignalCommand::Reset { at } => *at,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses (controller -> stdout)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub protocol_version: u32,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ResponsePayload {
    #[serde(rename = "ready")]
    Ready { state: IntersectionSnapshot },

    #[serde(rename = "ingested")]
    Ingested { outcome: IngestOutcome },

    /// Transitions committed by a `tick` (empty when nothing was due).
    #[serde(rename = "tick_complete")]
    TickComplete { transitions: Vec<PhaseChangeRecord> },

    #[serde(rename = "state")]
    State { state: IntersectionSnapshot },

    #[serde(rename = "lane")]
    Lane { lane: LaneSnapshot },

    #[serde(rename = "health")]
    Health { health: HealthSummary },

    /// Unsolicited: the controller announced a new snapshot.
    #[serde(rename = "traffic_state")]
    TrafficState { state: IntersectionSnapshot },

    #[serde(rename = "ok")]
    Ok,

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "goodbye")]
    Goodbye,
}

/// Bump when the command/response schema changes.
pub const PROTOCOL_VERSION: u32 = 1;

pub fn make_response(payload: ResponsePayload) -> SignalResponse {
    SignalResponse {
        protocol_version: PROTOCOL_VERSION,
        payload,
    }
}

/// Render a response as one protocol line (no trailing newline).
pub fn encode_line(response: &SignalResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        format!(
            "{{\"protocol_version\":{PROTOCOL_VERSION},\"type\":\"error\",\"message\":\"encode failed: {e}\"}}"
        )
    })
}
