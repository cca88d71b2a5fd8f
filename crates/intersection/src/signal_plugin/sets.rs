use bevy::prelude::*;

/// Ordered phases of the signal systems.
///
/// ```text
/// FixedUpdate:  Ingest  ->  Evaluate
/// Update:       Publish
/// ```
///
/// * **Ingest** drains the `SensorInbox` through the controller.
/// * **Evaluate** runs the time-driven tick, after any readings of the same
///   step have been applied.
/// * **Publish** forwards buffered notifications as Bevy events. Systems that
///   consume them should run `.after(SignalSet::Publish)`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignalSet {
    Ingest,
    Evaluate,
    Publish,
}
