//! Adaptive signal control for one intersection.
//!
//! Distance sensors report per-lane readings; the controller turns them into
//! debounced presence, keeps a fairness queue of lanes with waiting vehicles,
//! and runs a one-green-at-a-time phase machine bounded by minimum/maximum
//! green and maximum red times.
//!
//! The core (`controller` and the modules below it) is plain synchronous
//! code driven by explicit timestamps. `signal_plugin` hosts it in a Bevy
//! app; `protocol` and `replay` serve the `signalctl` binary.

pub mod config;
pub mod controller;
pub mod error;
pub mod fairness;
pub mod lanes;
pub mod notify;
pub mod presence;
pub mod protocol;
pub mod readings;
pub mod records;
pub mod replay;
pub mod scheduler;
pub mod signal_plugin;
pub mod snapshot;

#[cfg(any(test, feature = "bench"))]
pub mod test_harness;
#[cfg(any(test, feature = "bench"))]
pub mod traffic_feed;


/// Milliseconds on the controller's clock (Unix epoch for wall clocks).
pub type Millis = u64;

pub use config::SignalConfig;
pub use controller::{Controller, IngestOutcome};
pub use error::{ConfigError, IngestError, ReplayError};
pub use lanes::Phase;
pub use notify::{Notice, NoticeBuffer, NotificationSink};
pub use readings::SensorEvent;
pub use records::{PhaseChangeRecord, PresenceRecord, TransitionReason};
pub use signal_plugin::{SignalPlugin, SignalSet};
pub use snapshot::{Connectivity, HealthSummary, IntersectionSnapshot, LaneSnapshot};
