use bevy::prelude::*;

use crate::notify::Notice;
use crate::records::PhaseChangeRecord;
use crate::replay::{ReplayInput, ReplayRecorder};

use super::events::{PhaseChanged, PresenceClosed, SignalStateChanged};
use super::resources::{IngestResultLog, SensorInbox, SignalClock, SignalController, SignalOutbox};

pub fn sync_signal_clock(mut clock: ResMut<SignalClock>) {
    clock.sync();
}

/// Bring the controller to its initial state and, when a `ReplayRecorder`
/// is installed, start recording from that reset.
pub fn reset_on_startup(
    clock: Res<SignalClock>,
    mut controller: ResMut<SignalController>,
    recorder: Option<ResMut<ReplayRecorder>>,
) {
    let now = clock.now();
    controller.reset(now);
    if let Some(mut recorder) = recorder {
        if !recorder.is_recording() {
            recorder.start(controller.config().clone(), now);
        }
    }
}

/// Reset the controller at the current clock reading, recording the reset
/// when a recorder is installed. For hosts acting outside the schedules.
pub fn reset_intersection(world: &mut World) {
    let now = world.resource::<SignalClock>().now();
    world.resource_mut::<SignalController>().reset(now);
    if let Some(mut recorder) = world.get_resource_mut::<ReplayRecorder>() {
        recorder.record(now, ReplayInput::Reset);
    }
}

/// Run one time-driven evaluation at the current clock reading, recording it
/// when it commits anything. For hosts acting outside the schedules.
pub fn tick_intersection(world: &mut World) -> Vec<PhaseChangeRecord> {
    let now = world.resource::<SignalClock>().now();
    let transitions = world.resource_mut::<SignalController>().tick(now);
    if !transitions.is_empty() {
        if let Some(mut recorder) = world.get_resource_mut::<ReplayRecorder>() {
            recorder.record(now, ReplayInput::Tick);
        }
    }
    transitions
}

/// Feed every queued sensor event through the controller, in arrival order.
///
/// Events are validated here so the recorder captures the typed batch the
/// controller actually applied.
pub fn ingest_pending_readings(
    clock: Res<SignalClock>,
    mut inbox: ResMut<SensorInbox>,
    mut controller: ResMut<SignalController>,
    mut log: ResMut<IngestResultLog>,
    mut recorder: Option<ResMut<ReplayRecorder>>,
) {
    if inbox.is_empty() {
        return;
    }
    let now = clock.now();
    for event in inbox.drain() {
        let result = match event.validate() {
            Ok(batch) => {
                if let Some(recorder) = recorder.as_deref_mut() {
                    recorder.record(now, ReplayInput::Ingest(batch.clone()));
                }
                Ok(controller.ingest_batch(&batch, now))
            }
            Err(err) => {
                warn!(
                    "rejected sensor event from {}: {}",
                    event.device_id.as_deref().unwrap_or("<unknown device>"),
                    err
                );
                Err(err)
            }
        };
        log.push(now, result);
    }
}

pub fn tick_signal_controller(world: &mut World) {
    tick_intersection(world);
}

/// Forward buffered controller notifications as Bevy events.
pub fn publish_signal_notifications(
    outbox: Res<SignalOutbox>,
    mut states: EventWriter<SignalStateChanged>,
    mut phases: EventWriter<PhaseChanged>,
    mut presence: EventWriter<PresenceClosed>,
) {
    for notice in outbox.drain() {
        match notice {
            Notice::State(snapshot) => {
                states.send(SignalStateChanged(*snapshot));
            }
            Notice::PhaseChange(record) => {
                phases.send(PhaseChanged(record));
            }
            Notice::Presence(record) => {
                presence.send(PresenceClosed(record));
            }
        }
    }
}
