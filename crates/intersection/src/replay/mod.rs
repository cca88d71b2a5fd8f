//! Deterministic replay of controller inputs.
//!
//! Records the inputs that reached a controller (validated sensor batches,
//! committing ticks, resets) with the time they were processed, and re-runs
//! them against a fresh controller to check that it lands on the same state.

pub mod format;
pub mod player;
pub mod recorder;

pub use format::{ReplayEntry, ReplayFile, ReplayFooter, ReplayHeader, ReplayInput};
pub use player::{play, state_digest, verify, ReplayReport};
pub use recorder::ReplayRecorder;
