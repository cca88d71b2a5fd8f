//! Notification sinks.
//!
//! The controller announces every committed state change to each registered
//! sink, synchronously, after the mutation is complete. Sinks cannot fail
//! back into the controller; whatever they do with a notice is their own
//! business.

use std::sync::{Arc, Mutex, PoisonError};

use crate::records::{PhaseChangeRecord, PresenceRecord};
use crate::snapshot::IntersectionSnapshot;

pub trait NotificationSink: Send + Sync {
    /// Called once per announced change with the fresh snapshot.
    fn on_state(&mut self, snapshot: &IntersectionSnapshot);

    /// Transitions committed by the call being announced. Called before
    /// `on_state`, only when non-empty.
    fn on_phase_changes(&mut self, _records: &[PhaseChangeRecord]) {}

    /// Presence intervals closed by the call being announced. Called before
    /// `on_state`, only when non-empty.
    fn on_presence(&mut self, _records: &[PresenceRecord]) {}
}

/// Plain closures subscribe to snapshots only.
impl<F> NotificationSink for F
where
    F: FnMut(&IntersectionSnapshot) + Send + Sync,
{
    fn on_state(&mut self, snapshot: &IntersectionSnapshot) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    State(Box<IntersectionSnapshot>),
    PhaseChange(PhaseChangeRecord),
    Presence(PresenceRecord),
}

/// Sink that buffers notices for another owner to drain later. Clones share
/// the same buffer, so one clone goes to the controller and one stays with
/// the consumer.
#[derive(Debug, Clone, Default)]
pub struct NoticeBuffer {
    inner: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeBuffer {
    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *notices)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, notice: Notice) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

impl NotificationSink for NoticeBuffer {
    fn on_state(&mut self, snapshot: &IntersectionSnapshot) {
        self.push(Notice::State(Box::new(snapshot.clone())));
    }

    fn on_phase_changes(&mut self, records: &[PhaseChangeRecord]) {
        for record in records {
            self.push(Notice::PhaseChange(record.clone()));
        }
    }

    fn on_presence(&mut self, records: &[PresenceRecord]) {
        for record in records {
            self.push(Notice::Presence(record.clone()));
        }
    }
}
