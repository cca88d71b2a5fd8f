//! Seeded synthetic sensor traffic for invariant sweeps and benchmarks.
//!
//! Each configured sensor alternates between "vehicle present" and "clear"
//! spells of random length. Readings are occasionally garbled (text, null)
//! the way field devices sometimes report. Time moves forward by a random
//! step between events, and some steps are bare ticks.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};

use crate::config::SignalConfig;
use crate::readings::SensorEvent;
use crate::Millis;

/// Device id stamped on generated events.
pub const FEED_DEVICE: &str = "synthetic-feed";

#[derive(Debug, Clone)]
pub enum FeedStep {
    Ingest { at: Millis, event: SensorEvent },
    Tick { at: Millis },
}

impl FeedStep {
    pub fn at(&self) -> Millis {
        match self {
            FeedStep::Ingest { at, .. } | FeedStep::Tick { at } => *at,
        }
    }
}

#[derive(Debug, Clone)]
struct SensorTrack {
    id: String,
    occupied: bool,
    /// Time the current spell ends.
    until: Millis,
}

pub struct TrafficFeed {
    rng: ChaCha8Rng,
    sensors: Vec<SensorTrack>,
    threshold_cm: f64,
    now: Millis,
    /// Longest step between two feed events.
    max_step_ms: Millis,
}

impl TrafficFeed {
    pub fn new(seed: u64, config: &SignalConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            sensors: config
                .sensor_map
                .keys()
                .map(|id| SensorTrack {
                    id: id.clone(),
                    occupied: false,
                    until: 0,
                })
                .collect(),
            threshold_cm: config.detection_threshold_cm,
            now: 0,
            max_step_ms: 750,
        }
    }

    pub fn with_max_step(mut self, max_step_ms: Millis) -> Self {
        self.max_step_ms = max_step_ms.max(1);
        self
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn next_step(&mut self) -> FeedStep {
        self.now += self.rng.gen_range(1..=self.max_step_ms);
        if self.sensors.is_empty() || self.rng.gen_bool(0.3) {
            return FeedStep::Tick { at: self.now };
        }

        let mut readings = Map::new();
        for i in 0..self.sensors.len() {
            // Devices do not always report every sensor.
            if self.rng.gen_bool(0.2) {
                continue;
            }
            if self.sensors[i].until <= self.now {
                let occupied = !self.sensors[i].occupied;
                let spell = if occupied {
                    self.rng.gen_range(300..6_000)
                } else {
                    self.rng.gen_range(500..20_000)
                };
                self.sensors[i].occupied = occupied;
                self.sensors[i].until = self.now + spell;
            }
            let occupied = self.sensors[i].occupied;
            let value = self.reading(occupied);
            readings.insert(self.sensors[i].id.clone(), value);
        }

        FeedStep::Ingest {
            at: self.now,
            event: SensorEvent::new(FEED_DEVICE, Value::Object(readings)),
        }
    }

    /// Generate `n` steps.
    pub fn take(&mut self, n: usize) -> Vec<FeedStep> {
        (0..n).map(|_| self.next_step()).collect()
    }

    fn reading(&mut self, occupied: bool) -> Value {
        let roll: f64 = self.rng.gen();
        if roll < 0.02 {
            return Value::Null;
        }
        if roll < 0.04 {
            return Value::String("err".to_string());
        }
        let cm = if occupied {
            self.rng.gen_range(0.0..=self.threshold_cm)
        } else {
            self.rng.gen_range(self.threshold_cm + 1.0..self.threshold_cm + 400.0)
        };
        if roll < 0.1 {
            Value::String(format!("{cm:.1}"))
        } else {
            serde_json::json!(cm)
        }
    }
}
