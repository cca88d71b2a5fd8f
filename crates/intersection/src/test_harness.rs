//! # TestIntersection: headless harness for controller integration tests
//!
//! Wraps a Bevy `App` with `MinimalPlugins` + `SignalPlugin` on a manual
//! clock. Each step sets the clock, runs one `FixedUpdate` pass (ingest then
//! evaluate) and one `Update` pass (publish), and captures the published
//! events so tests can assert on what a subscriber would have seen.

use bevy::app::App;
use bevy::prelude::*;
use serde_json::Value;

use crate::config::SignalConfig;
use crate::controller::{Controller, IngestOutcome};
use crate::error::IngestError;
use crate::lanes::Phase;
use crate::readings::SensorEvent;
use crate::records::{PhaseChangeRecord, PresenceRecord};
use crate::replay::{state_digest, ReplayFile, ReplayRecorder};
use crate::signal_plugin::{
    reset_intersection, IngestResultLog, PhaseChanged, PresenceClosed, SensorInbox, SignalClock,
    SignalController, SignalPlugin, SignalSet, SignalStateChanged,
};
use crate::snapshot::{IntersectionSnapshot, LaneSnapshot};
use crate::Millis;

/// Device id stamped on events built by `ingest`.
pub const TEST_DEVICE: &str = "test-device";

/// Everything the plugin published since the harness started.
#[derive(Resource, Default)]
struct Captured {
    states: Vec<IntersectionSnapshot>,
    phase_changes: Vec<PhaseChangeRecord>,
    presence: Vec<PresenceRecord>,
}

fn capture_published(
    mut states: EventReader<SignalStateChanged>,
    mut phases: EventReader<PhaseChanged>,
    mut presence: EventReader<PresenceClosed>,
    mut captured: ResMut<Captured>,
) {
    captured
        .states
        .extend(states.read().map(|event| event.0.clone()));
    captured
        .phase_changes
        .extend(phases.read().map(|event| event.0.clone()));
    captured
        .presence
        .extend(presence.read().map(|event| event.0.clone()));
}

pub struct TestIntersection {
    app: App,
}

impl Default for TestIntersection {
    fn default() -> Self {
        Self::new()
    }
}

impl TestIntersection {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Default configuration, clock at 0.
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    pub fn with_config(config: SignalConfig) -> Self {
        Self::build(config, false)
    }

    /// Like `with_config`, with a `ReplayRecorder` installed before startup.
    pub fn recording(config: SignalConfig) -> Self {
        Self::build(config, true)
    }

    fn build(config: SignalConfig, record: bool) -> Self {
        let plugin = match SignalPlugin::new(config) {
            Ok(plugin) => plugin.with_clock(SignalClock::manual(0)),
            Err(e) => panic!("test config rejected: {e}"),
        };

        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        if record {
            app.insert_resource(ReplayRecorder::default());
        }
        app.add_plugins(plugin);
        app.init_resource::<Captured>();
        app.add_systems(Update, capture_published.after(SignalSet::Publish));

        // Startup systems (reset, recorder start) run on the first update.
        app.update();
        Self { app }
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    /// Send a reading batch from `TEST_DEVICE` processed at `at`.
    pub fn ingest(&mut self, at: Millis, sensors: Value) -> Result<IngestOutcome, IngestError> {
        self.ingest_event(at, SensorEvent::new(TEST_DEVICE, sensors))
    }

    pub fn ingest_event(
        &mut self,
        at: Millis,
        event: SensorEvent,
    ) -> Result<IngestOutcome, IngestError> {
        self.app.world_mut().resource_mut::<SensorInbox>().push(event);
        self.step(at);
        match self.app.world().resource::<IngestResultLog>().last() {
            Some(record) => record.result.clone(),
            None => panic!("ingest produced no result"),
        }
    }

    /// Run a time-driven evaluation at `at`.
    pub fn tick_at(&mut self, at: Millis) {
        self.step(at);
    }

    /// Tick every `step_ms` from `from` to `to` inclusive.
    pub fn tick_range(&mut self, from: Millis, to: Millis, step_ms: Millis) {
        let mut at = from;
        while at <= to {
            self.step(at);
            at += step_ms.max(1);
        }
    }

    pub fn reset_at(&mut self, at: Millis) {
        let world = self.app.world_mut();
        world.resource_mut::<SignalClock>().set(at);
        reset_intersection(world);
        world.run_schedule(Update);
    }

    fn step(&mut self, at: Millis) {
        let world = self.app.world_mut();
        world.resource_mut::<SignalClock>().set(at);
        world.run_schedule(FixedUpdate);
        world.run_schedule(Update);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn controller(&self) -> &Controller {
        &self.app.world().resource::<SignalController>().0
    }

    pub fn state(&self) -> IntersectionSnapshot {
        self.controller().state()
    }

    pub fn lane(&self, id: &str) -> LaneSnapshot {
        match self.controller().lane_state(id) {
            Some(lane) => lane,
            None => panic!("no lane '{id}'"),
        }
    }

    pub fn phase_of(&self, id: &str) -> Phase {
        self.lane(id).phase
    }

    pub fn queue(&self) -> Vec<String> {
        self.state().queue
    }

    pub fn published_states(&self) -> &[IntersectionSnapshot] {
        &self.app.world().resource::<Captured>().states
    }

    pub fn phase_changes(&self) -> &[PhaseChangeRecord] {
        &self.app.world().resource::<Captured>().phase_changes
    }

    pub fn presence_records(&self) -> &[PresenceRecord] {
        &self.app.world().resource::<Captured>().presence
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Stop the installed recorder and return the file, stamped with the
    /// digest of the current state.
    pub fn finish_recording(&mut self) -> ReplayFile {
        let digest = state_digest(&self.state());
        match self.app.world_mut().get_resource_mut::<ReplayRecorder>() {
            Some(mut recorder) => recorder.stop(digest),
            None => panic!("harness was not built with `recording`"),
        }
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    pub fn assert_invariants(&self) {
        if let Err(msg) = check_invariants(&self.state()) {
            panic!("{msg}");
        }
    }
}

/// Structural invariants every observable snapshot must satisfy.
pub fn check_invariants(state: &IntersectionSnapshot) -> Result<(), String> {
    let active = state
        .lanes
        .iter()
        .filter(|l| matches!(l.phase, Phase::Green | Phase::Yellow))
        .count();
    if active != 1 {
        return Err(format!("{active} lanes green or yellow at {}", state.timestamp));
    }

    let red_yellows = state.lanes_in(Phase::RedYellow).count();
    let yellows = state.lanes_in(Phase::Yellow).count();
    if red_yellows > 1 || (red_yellows == 1) != (yellows == 1) {
        return Err(format!(
            "{red_yellows} red_yellow lane(s) alongside {yellows} yellow at {}",
            state.timestamp
        ));
    }

    for lane in &state.lanes {
        if (lane.phase == Phase::Red) != lane.red_since.is_some() {
            return Err(format!(
                "lane {} is {:?} with red_since {:?}",
                lane.id, lane.phase, lane.red_since
            ));
        }
        if lane.waiting != state.queue.contains(&lane.id) {
            return Err(format!("lane {} waiting flag disagrees with queue", lane.id));
        }
        if lane.waiting && lane.phase == Phase::Green {
            return Err(format!("lane {} is queued while {:?}", lane.id, lane.phase));
        }
    }

    let mut seen = std::collections::BTreeSet::new();
    for id in &state.queue {
        if !seen.insert(id) {
            return Err(format!("lane {id} queued twice"));
        }
    }

    match state.lane(&state.current_lane) {
        Some(current) if matches!(current.phase, Phase::Green | Phase::Yellow) => Ok(()),
        Some(current) => Err(format!(
            "current lane {} is {:?}",
            current.id, current.phase
        )),
        None => Err(format!("current lane {} is not configured", state.current_lane)),
    }
}
