//! Record a plugin-driven session and replay it through a bare controller.

use serde_json::json;

use crate::replay::{self, ReplayFile, ReplayInput};
use crate::test_harness::TestIntersection;
use crate::traffic_feed::{FeedStep, TrafficFeed};
use crate::SignalConfig;

fn config() -> SignalConfig {
    SignalConfig {
        min_green_ms: 1_500,
        max_green_ms: 5_000,
        yellow_ms: 600,
        max_red_ms: 9_000,
        ..Default::default()
    }
}

fn recorded_session(seed: u64, steps: usize) -> (ReplayFile, TestIntersection) {
    let mut junction = TestIntersection::recording(config());
    for step in TrafficFeed::new(seed, &config()).take(steps) {
        match step {
            FeedStep::Ingest { at, event } => {
                junction.ingest_event(at, event).unwrap();
            }
            FeedStep::Tick { at } => junction.tick_at(at),
        }
    }
    (junction.finish_recording(), junction)
}

#[test]
fn replay_lands_on_the_recorded_state() {
    let (file, junction) = recorded_session(5, 1_500);
    let report = replay::verify(&file).unwrap();
    assert_eq!(report.final_state.lanes, junction.state().lanes);
    assert_eq!(report.final_state.queue, junction.state().queue);
    assert_eq!(report.transitions, junction.phase_changes().len());
}

#[test]
fn replay_survives_both_encodings() {
    let (file, _) = recorded_session(9, 400);
    let from_bytes = ReplayFile::from_bytes(&file.to_bytes()).unwrap();
    let from_json = ReplayFile::from_json(&file.to_json()).unwrap();
    let digest = replay::verify(&file).unwrap().digest;
    assert_eq!(replay::verify(&from_bytes).unwrap().digest, digest);
    assert_eq!(replay::verify(&from_json).unwrap().digest, digest);
}

#[test]
fn only_committing_ticks_are_recorded() {
    let mut junction = TestIntersection::recording(config());
    junction.tick_at(100);
    junction.tick_at(200);
    junction.ingest(300, json!({"sensor4": 4})).unwrap();
    junction.tick_at(1_500);
    junction.tick_at(1_600);
    junction.tick_at(2_100);

    let file = junction.finish_recording();
    let inputs: Vec<_> = file
        .entries
        .iter()
        .map(|e| match e.input {
            ReplayInput::Ingest(_) => ("ingest", e.at),
            ReplayInput::Tick => ("tick", e.at),
            ReplayInput::Reset => ("reset", e.at),
        })
        .collect();
    assert_eq!(
        inputs,
        vec![("ingest", 300), ("tick", 1_500), ("tick", 2_100)]
    );
    assert!(replay::verify(&file).is_ok());
}

#[test]
fn resets_are_recorded_and_replayed() {
    let mut junction = TestIntersection::recording(config());
    junction.ingest(100, json!({"sensor2": 4})).unwrap();
    junction.tick_at(1_500);
    junction.reset_at(1_700);
    junction.ingest(1_800, json!({"sensor1": 4})).unwrap();

    let file = junction.finish_recording();
    assert!(file
        .entries
        .iter()
        .any(|e| e.input == ReplayInput::Reset && e.at == 1_700));

    let report = replay::verify(&file).unwrap();
    assert_eq!(report.resets, 1);
    assert_eq!(report.final_state.queue, vec!["east"]);
}

#[test]
fn rejected_events_are_not_recorded() {
    let mut junction = TestIntersection::recording(config());
    let bad = crate::readings::SensorEvent {
        sensors: json!({"sensor2": 4}),
        ..Default::default()
    };
    assert!(junction.ingest_event(100, bad).is_err());

    let file = junction.finish_recording();
    assert!(file.entries.is_empty());
    assert!(replay::verify(&file).is_ok());
}
