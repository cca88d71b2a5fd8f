use std::time::Duration;

use bevy::prelude::*;

use crate::config::SignalConfig;
use crate::controller::Controller;
use crate::error::ConfigError;

use super::events::{PhaseChanged, PresenceClosed, SignalStateChanged};
use super::resources::{IngestResultLog, SensorInbox, SignalClock, SignalController, SignalOutbox};
use super::sets::SignalSet;
use super::systems::{
    ingest_pending_readings, publish_signal_notifications, reset_on_startup, sync_signal_clock,
    tick_signal_controller,
};

/// Period of the time-driven evaluation.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Registers the controller resources, events and systems.
///
/// The `FixedUpdate` timestep is set to the tick interval, so a host running
/// the main schedule in a loop gets one evaluation per interval.
pub struct SignalPlugin {
    config: SignalConfig,
    clock: SignalClock,
    tick_interval: Duration,
}

impl SignalPlugin {
    /// Fails when `config` would be refused by the controller.
    pub fn new(config: SignalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: SignalClock::wall(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        })
    }

    pub fn with_clock(mut self, clock: SignalClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

impl Plugin for SignalPlugin {
    fn build(&self, app: &mut App) {
        let mut controller = Controller::from_validated(self.config.clone(), self.clock.now());
        let outbox = SignalOutbox::default();
        controller.subscribe(outbox.0.clone());

        info!(
            "signal controller: {} lanes, tick every {} ms",
            self.config.lanes.len(),
            self.tick_interval.as_millis()
        );

        app.insert_resource(SignalController(controller))
            .insert_resource(self.clock)
            .insert_resource(outbox)
            .init_resource::<SensorInbox>()
            .init_resource::<IngestResultLog>()
            .insert_resource(Time::<Fixed>::from_duration(self.tick_interval))
            .add_event::<SignalStateChanged>()
            .add_event::<PhaseChanged>()
            .add_event::<PresenceClosed>();

        app.configure_sets(FixedUpdate, (SignalSet::Ingest, SignalSet::Evaluate).chain());

        app.add_systems(Startup, reset_on_startup)
            .add_systems(First, sync_signal_clock)
            .add_systems(
                FixedUpdate,
                (
                    ingest_pending_readings.in_set(SignalSet::Ingest),
                    tick_signal_controller.in_set(SignalSet::Evaluate),
                ),
            )
            .add_systems(
                Update,
                publish_signal_notifications.in_set(SignalSet::Publish),
            );
    }
}
