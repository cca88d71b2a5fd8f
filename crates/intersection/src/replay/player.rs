//! Replay player: re-runs recorded inputs through a fresh controller.
//!
//! The controller is built from the header's configuration and reset at the
//! header's start time, then fed every entry through the same entry points
//! live traffic uses.

use bevy::log::{info, warn};
use xxhash_rust::xxh32::xxh32;

use crate::controller::Controller;
use crate::error::ReplayError;
use crate::snapshot::{Connectivity, IntersectionSnapshot};

use super::format::{ReplayFile, ReplayInput};

const DIGEST_SEED: u32 = 0;

/// What a replay run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub final_state: IntersectionSnapshot,
    pub digest: u32,
    pub ingests: usize,
    pub ticks: usize,
    pub resets: usize,
    pub transitions: usize,
    pub presence_records: usize,
}

/// xxh32 over the bitcode encoding of the snapshot.
///
/// Connectivity flags are host-supplied and not part of the signal state, so
/// they are cleared before hashing.
pub fn state_digest(snapshot: &IntersectionSnapshot) -> u32 {
    let mut normalized = snapshot.clone();
    normalized.connectivity = Connectivity::default();
    xxh32(&bitcode::encode(&normalized), DIGEST_SEED)
}

/// Run every entry and report the final state. Does not check the digest.
pub fn play(replay: &ReplayFile) -> Result<ReplayReport, ReplayError> {
    replay.validate()?;
    let mut controller = Controller::new(replay.header.config.clone(), replay.header.start_at)?;

    let mut report = ReplayReport {
        final_state: controller.state(),
        digest: 0,
        ingests: 0,
        ticks: 0,
        resets: 0,
        transitions: 0,
        presence_records: 0,
    };

    for entry in &replay.entries {
        match &entry.input {
            ReplayInput::Ingest(batch) => {
                let outcome = controller.ingest_batch(batch, entry.at);
                report.ingests += 1;
                report.transitions += outcome.transitions.len();
                report.presence_records += outcome.presence.len();
            }
            ReplayInput::Tick => {
                report.ticks += 1;
                report.transitions += controller.tick(entry.at).len();
            }
            ReplayInput::Reset => {
                report.resets += 1;
                controller.reset(entry.at);
            }
        }
    }

    report.final_state = controller.state();
    report.digest = state_digest(&report.final_state);
    Ok(report)
}

/// Play the file and require the recorded final digest.
pub fn verify(replay: &ReplayFile) -> Result<ReplayReport, ReplayError> {
    let report = play(replay)?;
    if report.digest != replay.footer.final_digest {
        warn!(
            "replay diverged after {} entries: recorded {:08x}, replayed {:08x}",
            replay.entries.len(),
            replay.footer.final_digest,
            report.digest
        );
        return Err(ReplayError::DigestMismatch {
            expected: replay.footer.final_digest,
            actual: report.digest,
        });
    }
    info!(
        "replay verified: {} entries, {} transitions, digest {:08x}",
        replay.entries.len(),
        report.transitions,
        report.digest
    );
    Ok(report)
}
