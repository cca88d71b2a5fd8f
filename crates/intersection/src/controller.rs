//! Controller facade: the two mutating entry points (`ingest`, `tick`),
//! `reset`, and the read-only queries.
//!
//! Every call runs to completion synchronously. The controller does no
//! locking; a host that shares it between threads must serialize access.

use bevy::log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::SignalConfig;
use crate::error::{ConfigError, IngestError};
use crate::fairness::FairnessQueue;
use crate::lanes::LaneStore;
use crate::notify::NotificationSink;
use crate::presence::PresenceTracker;
use crate::readings::{SensorBatch, SensorEvent};
use crate::records::{PhaseChangeRecord, PresenceRecord};
use crate::scheduler::PhaseScheduler;
use crate::snapshot::{Connectivity, HealthSummary, IntersectionSnapshot, LaneSnapshot};
use crate::Millis;

/// Everything one `ingest` call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub intersection_id: String,
    pub device_id: String,
    /// Device timestamp, or the processing time when the device sent none.
    pub timestamp: Millis,
    pub processed_at: Millis,
    pub state: IntersectionSnapshot,
    pub transitions: Vec<PhaseChangeRecord>,
    pub presence: Vec<PresenceRecord>,
}

pub struct Controller {
    config: SignalConfig,
    lanes: LaneStore,
    queue: FairnessQueue,
    presence: PresenceTracker,
    scheduler: PhaseScheduler,
    observed_at: Millis,
    connectivity: Connectivity,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Controller {
    /// Validate `config` and start from the reset state at `now`.
    pub fn new(config: SignalConfig, now: Millis) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config, now))
    }

    /// Callers must have run `SignalConfig::validate` already.
    pub(crate) fn from_validated(config: SignalConfig, now: Millis) -> Self {
        Self {
            lanes: LaneStore::initial(&config.lanes, now),
            queue: FairnessQueue::new(config.lanes.len()),
            presence: PresenceTracker::new(&config),
            scheduler: PhaseScheduler::new(&config),
            observed_at: now,
            connectivity: Connectivity::default(),
            sinks: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Register a sink. It hears about changes from the next call onwards.
    pub fn subscribe(&mut self, sink: impl NotificationSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Validate and apply one sensor event processed at `now`.
    ///
    /// Invalid input is rejected before any lane state is touched.
    pub fn ingest(&mut self, event: &SensorEvent, now: Millis) -> Result<IngestOutcome, IngestError> {
        let batch = event.validate()?;
        Ok(self.ingest_batch(&batch, now))
    }

    /// Apply already-validated readings. Used directly by replay.
    pub fn ingest_batch(&mut self, batch: &SensorBatch, now: Millis) -> IngestOutcome {
        self.observed_at = now;
        let update = self
            .presence
            .apply(&batch.readings, now, &mut self.lanes, &mut self.queue);
        let transitions = self.scheduler.evaluate(now, &mut self.lanes, &mut self.queue);

        self.announce(&transitions, &update.records);

        IngestOutcome {
            intersection_id: batch.intersection_id.clone(),
            device_id: batch.device_id.clone(),
            timestamp: batch.timestamp.unwrap_or(now),
            processed_at: now,
            state: self.state(),
            transitions,
            presence: update.records,
        }
    }

    /// Time-driven evaluation. Returns nothing when no threshold was crossed.
    pub fn tick(&mut self, now: Millis) -> Vec<PhaseChangeRecord> {
        let transitions = self.scheduler.evaluate(now, &mut self.lanes, &mut self.queue);
        if !transitions.is_empty() {
            self.observed_at = now;
            self.announce(&transitions, &[]);
        }
        transitions
    }

    /// Back to the initial state: first lane green, the rest red, empty queue.
    pub fn reset(&mut self, now: Millis) {
        self.lanes = LaneStore::initial(&self.config.lanes, now);
        self.queue = FairnessQueue::new(self.config.lanes.len());
        self.scheduler.reset();
        self.observed_at = now;
        info!(
            "intersection reset at {}: {} green, {} lanes",
            now,
            self.config.lanes[0],
            self.lanes.len()
        );
        self.announce(&[], &[]);
    }

    pub fn state(&self) -> IntersectionSnapshot {
        IntersectionSnapshot {
            timestamp: self.observed_at,
            current_lane: self.lanes.get(self.scheduler.current()).id.clone(),
            next_lane: self
                .scheduler
                .successor()
                .map(|i| self.lanes.get(i).id.clone()),
            lanes: self
                .lanes
                .iter()
                .enumerate()
                .map(|(i, lane)| LaneSnapshot::capture(lane, self.queue.contains(i)))
                .collect(),
            queue: self
                .queue
                .iter()
                .map(|i| self.lanes.get(i).id.clone())
                .collect(),
            config: self.config.clone(),
            connectivity: self.connectivity,
        }
    }

    /// `None` when `id` is not a configured lane.
    pub fn lane_state(&self, id: &str) -> Option<LaneSnapshot> {
        let index = self.lanes.index_of(id)?;
        Some(LaneSnapshot::capture(
            self.lanes.get(index),
            self.queue.contains(index),
        ))
    }

    pub fn current_lane(&self) -> &str {
        &self.lanes.get(self.scheduler.current()).id
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Flags are echoed in snapshots; changing them is not announced.
    pub fn set_connectivity(&mut self, connectivity: Connectivity) {
        self.connectivity = connectivity;
    }

    pub fn health(&self) -> HealthSummary {
        HealthSummary {
            status: "ok".to_string(),
            lanes: self.lanes.len(),
            queue: self.queue.len(),
        }
    }

    fn announce(&mut self, transitions: &[PhaseChangeRecord], presence: &[PresenceRecord]) {
        if self.sinks.is_empty() {
            return;
        }
        let snapshot = self.state();
        debug!(
            "announcing state to {} sink(s): {} transition(s), {} presence record(s)",
            self.sinks.len(),
            transitions.len(),
            presence.len()
        );
        for sink in &mut self.sinks {
            if !transitions.is_empty() {
                sink.on_phase_changes(transitions);
            }
            if !presence.is_empty() {
                sink.on_presence(presence);
            }
            sink.on_state(&snapshot);
        }
    }
}
