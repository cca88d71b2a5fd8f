//! Replay recorder: captures controller inputs as they are processed.
//!
//! The signal plugin's systems feed the recorder when it is present as a
//! resource. Ticks that commit nothing are not recorded; replaying them would
//! not change any state.

use bevy::prelude::*;

use crate::config::SignalConfig;
use crate::Millis;

use super::format::{
    ReplayEntry, ReplayFile, ReplayFooter, ReplayHeader, ReplayInput, CURRENT_FORMAT_VERSION,
};

#[derive(Resource, Default)]
pub struct ReplayRecorder {
    header: Option<ReplayHeader>,
    entries: Vec<ReplayEntry>,
    recording: bool,
    last_at: Millis,
}

impl ReplayRecorder {
    /// Begin a new recording from a controller that was reset at `start_at`.
    ///
    /// Clears any previous entries.
    pub fn start(&mut self, config: SignalConfig, start_at: Millis) {
        self.recording = true;
        self.entries.clear();
        self.last_at = start_at;
        self.header = Some(ReplayHeader {
            format_version: CURRENT_FORMAT_VERSION,
            config,
            start_at,
        });
    }

    /// Append an input. No-op unless recording.
    pub fn record(&mut self, at: Millis, input: ReplayInput) {
        if self.recording {
            // Wall clocks can step backwards; the file must stay ordered.
            let at = at.max(self.last_at);
            self.last_at = at;
            self.entries.push(ReplayEntry { at, input });
        }
    }

    /// Stop recording and produce the finished file. `final_digest` is the
    /// digest of the live controller's state at this point.
    pub fn stop(&mut self, final_digest: u32) -> ReplayFile {
        self.recording = false;
        let header = self.header.take().unwrap_or(ReplayHeader {
            format_version: CURRENT_FORMAT_VERSION,
            config: SignalConfig::default(),
            start_at: 0,
        });
        let entries = std::mem::take(&mut self.entries);
        let entry_count = entries.len() as u64;
        ReplayFile {
            header,
            entries,
            footer: ReplayFooter {
                end_at: self.last_at,
                final_digest,
                entry_count,
            },
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
