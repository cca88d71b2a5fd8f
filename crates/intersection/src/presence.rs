//! Presence tracking: raw distance samples -> debounced occupancy per lane.
//!
//! Applies the detection threshold, keeps the open presence interval per
//! lane, and maintains queue membership for lanes with an active call. No
//! phase decisions are made here.

use std::collections::BTreeMap;

use bevy::log::trace;

use crate::config::SignalConfig;
use crate::fairness::FairnessQueue;
use crate::lanes::{LaneStore, Phase};
use crate::readings::RawReading;
use crate::records::PresenceRecord;
use crate::Millis;

/// What one batch of readings did to the lanes.
#[derive(Debug, Default)]
pub struct PresenceUpdate {
    pub records: Vec<PresenceRecord>,
    /// Number of readings that addressed a configured lane.
    pub lanes_sampled: usize,
}

#[derive(Debug, Clone)]
pub struct PresenceTracker {
    /// Sensor id (or bare lane id) -> lane index.
    routes: BTreeMap<String, usize>,
    threshold_cm: f64,
    presence_timeout_ms: Millis,
}

impl PresenceTracker {
    pub fn new(config: &SignalConfig) -> Self {
        let mut routes = BTreeMap::new();
        for (sensor, lane) in &config.sensor_map {
            if let Some(index) = config.lane_index(lane) {
                routes.insert(sensor.clone(), index);
            }
        }
        // A reading keyed by the lane id itself addresses that lane, unless a
        // sensor of the same name was mapped explicitly.
        for (index, lane) in config.lanes.iter().enumerate() {
            routes.entry(lane.clone()).or_insert(index);
        }
        Self {
            routes,
            threshold_cm: config.detection_threshold_cm,
            presence_timeout_ms: config.presence_timeout_ms,
        }
    }

    pub fn route(&self, sensor: &str) -> Option<usize> {
        self.routes.get(sensor).copied()
    }

    #[inline]
    pub fn detects_vehicle(&self, distance_cm: Option<f64>) -> bool {
        distance_cm.is_some_and(|d| d <= self.threshold_cm)
    }

    /// Apply a batch of readings taken at `now`.
    pub fn apply(
        &self,
        readings: &[(String, RawReading)],
        now: Millis,
        lanes: &mut LaneStore,
        queue: &mut FairnessQueue,
    ) -> PresenceUpdate {
        let mut update = PresenceUpdate::default();

        for (sensor, raw) in readings {
            let Some(index) = self.route(sensor) else {
                trace!("ignoring reading from unmapped sensor '{}'", sensor);
                continue;
            };
            update.lanes_sampled += 1;

            let distance = raw.distance_cm();
            let vehicle = self.detects_vehicle(distance);

            let lane = lanes.get_mut(index);
            let was_occupied = lane.is_occupied;
            lane.last_sample_at = Some(now);
            lane.last_distance_cm = distance;

            if vehicle {
                lane.last_vehicle_at = Some(now);
                if !was_occupied {
                    lane.presence_started_at = Some(now);
                    lane.presence_triggered_change = false;
                }
                lane.is_occupied = true;
                lane.last_cleared_at = None;

                // Green lanes are already served.
                if lane.phase != Phase::Green {
                    queue.push(index);
                }
                continue;
            }

            lane.is_occupied = false;
            lane.last_cleared_at = Some(now);
            if was_occupied {
                if let Some(detected_at) = lane.presence_started_at.take() {
                    update.records.push(PresenceRecord {
                        lane_id: lane.id.clone(),
                        detected_at,
                        cleared_at: now,
                        wait_ms: now.saturating_sub(detected_at),
                        triggered_change: lane.presence_triggered_change,
                    });
                    lane.presence_triggered_change = false;
                }
            }

            if queue.contains(index) {
                let absent_for = lane
                    .last_vehicle_at
                    .map_or(Millis::MAX, |seen| now.saturating_sub(seen));
                if !lane.is_green() || absent_for > self.presence_timeout_ms {
                    queue.remove(index);
                }
            }
        }

        update
    }
}
