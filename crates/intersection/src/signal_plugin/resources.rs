use std::time::{SystemTime, UNIX_EPOCH};

use bevy::prelude::*;

use crate::controller::{Controller, IngestOutcome};
use crate::error::IngestError;
use crate::notify::NoticeBuffer;
use crate::readings::SensorEvent;
use crate::Millis;

/// The controller, owned by the ECS world.
#[derive(Resource, Deref, DerefMut)]
pub struct SignalController(pub Controller);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Unix epoch milliseconds from the system clock.
    Wall,
    /// Only moves when told to. Used by tests and scripted drivers.
    Manual,
}

/// Time source for every controller call made by the plugin.
///
/// The reading is latched once per frame (`sync_signal_clock`) so all
/// systems in a frame agree on "now", and it never moves backwards.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalClock {
    source: ClockSource,
    now: Millis,
}

impl SignalClock {
    pub fn wall() -> Self {
        Self {
            source: ClockSource::Wall,
            now: wall_clock_ms(),
        }
    }

    pub fn manual(start: Millis) -> Self {
        Self {
            source: ClockSource::Manual,
            now: start,
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    pub fn is_manual(&self) -> bool {
        self.source == ClockSource::Manual
    }

    /// Move a manual clock to `at`. Earlier times are ignored.
    pub fn set(&mut self, at: Millis) {
        if self.is_manual() {
            self.now = self.now.max(at);
        }
    }

    pub fn advance_by(&mut self, ms: Millis) {
        if self.is_manual() {
            self.now = self.now.saturating_add(ms);
        }
    }

    /// Latch the system clock. No-op for manual clocks.
    pub fn sync(&mut self) {
        if self.source == ClockSource::Wall {
            self.now = self.now.max(wall_clock_ms());
        }
    }
}

impl Default for SignalClock {
    fn default() -> Self {
        Self::wall()
    }
}

fn wall_clock_ms() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

/// Sensor events waiting for the next `SignalSet::Ingest` pass, in arrival
/// order.
#[derive(Resource, Default, Debug)]
pub struct SensorInbox {
    pending: Vec<SensorEvent>,
}

impl SensorInbox {
    pub fn push(&mut self, event: SensorEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<SensorEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Maximum number of ingest results kept in the log.
const MAX_ENTRIES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestRecord {
    pub at: Millis,
    pub result: Result<IngestOutcome, IngestError>,
}

/// Ring buffer of the most recent ingest results so transports can answer
/// the device that sent each event.
#[derive(Resource, Default, Debug)]
pub struct IngestResultLog {
    entries: Vec<IngestRecord>,
}

impl IngestResultLog {
    /// Oldest entry is evicted when full.
    pub fn push(&mut self, at: Millis, result: Result<IngestOutcome, IngestError>) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.remove(0);
        }
        self.entries.push(IngestRecord { at, result });
    }

    pub fn last(&self) -> Option<&IngestRecord> {
        self.entries.last()
    }

    pub fn last_n(&self, n: usize) -> &[IngestRecord] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Notification buffer the controller writes into; drained every frame by
/// `publish_signal_notifications`.
#[derive(Resource, Clone, Default, Debug, Deref)]
pub struct SignalOutbox(pub NoticeBuffer);
