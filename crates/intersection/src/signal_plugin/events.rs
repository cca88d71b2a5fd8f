use bevy::prelude::*;

use crate::records::{PhaseChangeRecord, PresenceRecord};
use crate::snapshot::IntersectionSnapshot;

/// The controller announced a new snapshot.
#[derive(Event, Debug, Clone)]
pub struct SignalStateChanged(pub IntersectionSnapshot);

#[derive(Event, Debug, Clone)]
pub struct PhaseChanged(pub PhaseChangeRecord);

/// A lane's presence interval closed.
#[derive(Event, Debug, Clone)]
pub struct PresenceClosed(pub PresenceRecord);
