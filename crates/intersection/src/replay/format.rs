//! Core data types for the replay file format.
//!
//! A replay file captures the inputs a controller processed, tagged by
//! processing time, so a fresh controller built from the same configuration
//! reproduces the run exactly.

use std::path::Path;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::SignalConfig;
use crate::error::ReplayError;
use crate::readings::SensorBatch;
use crate::Millis;

/// Format version for forward-compatibility checks.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, PartialEq)]
pub struct ReplayHeader {
    pub format_version: u32,
    /// Configuration the recorded controller ran with.
    pub config: SignalConfig,
    /// Time of the reset the recording starts from.
    pub start_at: Millis,
}

/// One controller input.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, PartialEq)]
pub enum ReplayInput {
    Ingest(SensorBatch),
    Tick,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, PartialEq)]
pub struct ReplayEntry {
    /// Processing time handed to the controller.
    pub at: Millis,
    pub input: ReplayInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, PartialEq)]
pub struct ReplayFooter {
    pub end_at: Millis,
    /// xxh32 digest of the final state (see `player::state_digest`).
    pub final_digest: u32,
    pub entry_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, PartialEq)]
pub struct ReplayFile {
    pub header: ReplayHeader,
    pub entries: Vec<ReplayEntry>,
    pub footer: ReplayFooter,
}

impl ReplayFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplayError> {
        bitcode::decode(bytes).map_err(|e| ReplayError::Decode(format!("bitcode: {e}")))
    }

    /// Pretty JSON for debugging.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        serde_json::from_str(json).map_err(|e| ReplayError::Decode(format!("JSON: {e}")))
    }

    /// Write to `path`; a `.json` extension selects the JSON encoding.
    pub fn save(&self, path: &Path) -> Result<(), ReplayError> {
        if is_json(path) {
            std::fs::write(path, self.to_json())?;
        } else {
            std::fs::write(path, self.to_bytes())?;
        }
        Ok(())
    }

    /// Read from `path` and validate.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let replay = if is_json(path) {
            Self::from_json(&std::fs::read_to_string(path)?)?
        } else {
            Self::from_bytes(&std::fs::read(path)?)?
        };
        replay.validate()?;
        Ok(replay)
    }

    /// Internal consistency:
    /// - known format version and a valid configuration
    /// - `footer.entry_count` matches `entries.len()`
    /// - entries non-decreasing in time, none before `start_at`
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.header.format_version != CURRENT_FORMAT_VERSION {
            return Err(ReplayError::UnsupportedVersion {
                found: self.header.format_version,
                expected: CURRENT_FORMAT_VERSION,
            });
        }
        self.header.config.validate()?;

        if self.footer.entry_count != self.entries.len() as u64 {
            return Err(ReplayError::EntryCountMismatch {
                declared: self.footer.entry_count,
                found: self.entries.len(),
            });
        }

        let mut previous = self.header.start_at;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.at < previous {
                return Err(ReplayError::OutOfOrder {
                    index,
                    previous,
                    at: entry.at,
                });
            }
            previous = entry.at;
        }

        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
