//! Bevy integration for the signal controller.
//!
//! `SignalPlugin` owns a `Controller` as a resource, drains queued sensor
//! events and runs time-driven ticks on the `FixedUpdate` clock, and turns
//! controller notifications into Bevy events once per frame.

mod events;
mod plugin;
mod resources;
mod sets;
mod systems;

pub use events::{PhaseChanged, PresenceClosed, SignalStateChanged};
pub use plugin::{SignalPlugin, DEFAULT_TICK_INTERVAL};
pub use resources::{
    ClockSource, IngestRecord, IngestResultLog, SensorInbox, SignalClock, SignalController,
    SignalOutbox,
};
pub use sets::SignalSet;
pub use systems::{
    ingest_pending_readings, publish_signal_notifications, reset_intersection, reset_on_startup,
    sync_signal_clock, tick_intersection, tick_signal_controller,
};
