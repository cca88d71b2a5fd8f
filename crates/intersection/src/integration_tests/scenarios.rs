//! Behavioural scenarios for presence, hysteresis, queueing and the timing
//! bounds.

use serde_json::json;

use crate::error::IngestError;
use crate::lanes::Phase;
use crate::readings::SensorEvent;
use crate::records::TransitionReason;
use crate::test_harness::TestIntersection;
use crate::SignalConfig;

fn quick_config() -> SignalConfig {
    SignalConfig {
        min_green_ms: 1_000,
        max_green_ms: 2_000,
        yellow_ms: 500,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Service of a waiting lane
// ---------------------------------------------------------------------------

#[test]
fn waiting_west_lane_is_served_after_min_green_and_yellow() {
    let mut junction = TestIntersection::with_config(quick_config());

    junction.ingest(100, json!({"sensor4": 8})).unwrap();
    assert_eq!(junction.queue(), vec!["west"]);
    assert!(junction.lane("west").waiting);

    junction.tick_at(1_300);
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    assert_eq!(junction.phase_of("west"), Phase::RedYellow);
    assert!(junction.queue().is_empty());
    assert_eq!(junction.state().next_lane.as_deref(), Some("west"));
    junction.assert_invariants();

    junction.tick_at(1_900);
    assert_eq!(junction.phase_of("north"), Phase::Red);
    assert_eq!(junction.phase_of("west"), Phase::Green);
    assert!(junction.queue().is_empty());
    assert_eq!(junction.state().current_lane, "west");
    assert_eq!(junction.lane("west").cycles_completed, 1);
    assert_eq!(junction.lane("north").red_since, Some(1_900));
    junction.assert_invariants();
}

#[test]
fn transitions_carry_reasons_and_durations() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor4": 8})).unwrap();
    junction.tick_at(1_300);
    junction.tick_at(1_900);

    let changes = junction.phase_changes();
    assert_eq!(changes.len(), 4);

    assert_eq!(changes[0].lane_id, "north");
    assert_eq!(changes[0].next, Phase::Yellow);
    assert_eq!(changes[0].reason, TransitionReason::MinGreenElapsed);
    assert_eq!(changes[0].duration_ms, 1_300);

    assert_eq!(changes[1].lane_id, "west");
    assert_eq!(changes[1].next, Phase::RedYellow);
    assert_eq!(changes[1].reason, TransitionReason::PreparingForGreen);

    assert_eq!(changes[2].next, Phase::Red);
    assert_eq!(changes[2].reason, TransitionReason::YellowElapsed);
    assert_eq!(changes[2].duration_ms, 600);
    assert_eq!(changes[3].lane_id, "west");
    assert_eq!(changes[3].next, Phase::Green);
}

// ---------------------------------------------------------------------------
// Hysteresis
// ---------------------------------------------------------------------------

fn hysteresis_config() -> SignalConfig {
    SignalConfig {
        detection_threshold_cm: 30.0,
        min_green_ms: 100,
        max_green_ms: 5_000,
        yellow_ms: 50,
        hold_after_clear_ms: 150,
        vehicle_presence_grace_ms: 250,
        ..Default::default()
    }
}

#[test]
fn green_is_held_while_occupied_and_through_the_clear_windows() {
    let mut junction = TestIntersection::with_config(hysteresis_config());

    junction.ingest(20, json!({"sensor3": 10})).unwrap();
    assert!(junction.lane("north").is_occupied);

    junction.tick_at(160);
    assert_eq!(junction.phase_of("north"), Phase::Green, "occupied lane holds");

    junction.ingest(220, json!({"sensor3": 999})).unwrap();
    let north = junction.lane("north");
    assert!(!north.is_occupied);
    assert_eq!(north.last_cleared_at, Some(220));
    assert_eq!(junction.phase_of("north"), Phase::Green, "grace window holds");

    junction.tick_at(320);
    assert_eq!(junction.phase_of("north"), Phase::Green, "post-clear window holds");

    junction.tick_at(370);
    assert_eq!(junction.phase_of("north"), Phase::Green);

    junction.tick_at(371);
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    assert_eq!(junction.phase_of("west"), Phase::RedYellow, "round robin successor");
}

#[test]
fn lane_is_eligible_to_lose_green_once_both_windows_pass() {
    let mut junction = TestIntersection::with_config(hysteresis_config());
    junction.ingest(20, json!({"sensor3": 10})).unwrap();
    junction.ingest(220, json!({"sensor3": 999})).unwrap();

    junction.tick_at(220 + 150 + 250);
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
}

#[test]
fn empty_readings_on_the_green_lane_hold_it() {
    let config = SignalConfig {
        min_green_ms: 1_000,
        max_green_ms: 10_000,
        hold_after_clear_ms: 2_000,
        ..Default::default()
    };
    let mut junction = TestIntersection::with_config(config);

    junction.ingest(900, json!({"sensor3": 999, "sensor4": 5})).unwrap();
    assert_eq!(junction.lane("north").last_cleared_at, Some(900));
    assert_eq!(junction.queue(), vec!["west"]);

    junction.tick_at(1_000);
    assert_eq!(junction.phase_of("north"), Phase::Green);

    // Each empty reading restarts the post-clear window.
    junction.ingest(2_500, json!({"sensor3": 999})).unwrap();
    assert_eq!(junction.lane("north").last_cleared_at, Some(2_500));
    junction.tick_at(4_500);
    assert_eq!(junction.phase_of("north"), Phase::Green);

    junction.tick_at(4_501);
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    assert_eq!(junction.phase_of("west"), Phase::RedYellow);
    junction.assert_invariants();
}

#[test]
fn vehicle_arriving_on_the_primed_lane_waits_until_green() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.tick_at(1_000);
    assert_eq!(junction.phase_of("west"), Phase::RedYellow);

    junction.ingest(1_200, json!({"sensor4": 5})).unwrap();
    assert_eq!(junction.queue(), vec!["west"]);
    assert!(junction.lane("west").waiting);
    junction.assert_invariants();

    junction.tick_at(1_500);
    assert_eq!(junction.phase_of("west"), Phase::Green);
    assert!(junction.queue().is_empty());
    junction.assert_invariants();
}

#[test]
fn max_green_overrides_a_held_lane() {
    let mut junction = TestIntersection::with_config(quick_config());
    for at in (0..=2_000).step_by(250) {
        junction.ingest(at, json!({"sensor3": 4})).unwrap();
        if at < 2_000 {
            assert_eq!(junction.phase_of("north"), Phase::Green, "held at {at}");
        }
    }
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    let change = &junction.phase_changes()[0];
    assert_eq!(change.reason, TransitionReason::MaxGreenElapsed);
    assert_eq!(change.duration_ms, 2_000);
}

#[test]
fn vehicle_that_came_and_went_releases_min_green_early() {
    let config = SignalConfig {
        min_green_ms: 5_000,
        max_green_ms: 10_000,
        yellow_ms: 500,
        hold_after_clear_ms: 200,
        vehicle_presence_grace_ms: 300,
        ..Default::default()
    };
    let mut junction = TestIntersection::with_config(config);
    junction.ingest(100, json!({"sensor3": 5})).unwrap();
    junction.ingest(200, json!({"sensor3": 300})).unwrap();

    junction.tick_at(400);
    assert_eq!(junction.phase_of("north"), Phase::Green);
    junction.tick_at(401);
    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    assert_eq!(junction.phase_changes()[0].reason, TransitionReason::MinGreenElapsed);
}

// ---------------------------------------------------------------------------
// Queue behaviour
// ---------------------------------------------------------------------------

#[test]
fn clearing_before_service_removes_lane_from_queue() {
    let mut junction = TestIntersection::with_config(quick_config());

    junction.ingest(100, json!({"sensor2": 5})).unwrap();
    assert_eq!(junction.queue(), vec!["south"]);

    junction.ingest(200, json!({"sensor2": 500})).unwrap();
    assert!(junction.queue().is_empty());
    assert!(!junction.lane("south").waiting);

    let records = junction.presence_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lane_id, "south");
    assert_eq!(records[0].wait_ms, 100);
    assert!(!records[0].triggered_change);
    junction.assert_invariants();
}

#[test]
fn repeated_detections_do_not_duplicate_queue_entries() {
    let mut junction = TestIntersection::with_config(quick_config());
    for at in [100, 150, 200, 250] {
        junction.ingest(at, json!({"sensor1": 3, "sensor2": 3})).unwrap();
    }
    // Readings within one event apply in sensor id order.
    assert_eq!(junction.queue(), vec!["east", "south"]);
    junction.assert_invariants();
}

#[test]
fn queue_order_decides_successor() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor1": 3})).unwrap();
    junction.ingest(200, json!({"sensor4": 3})).unwrap();
    assert_eq!(junction.queue(), vec!["east", "west"]);

    junction.tick_at(1_000);
    assert_eq!(junction.phase_of("east"), Phase::RedYellow);
    assert_eq!(junction.queue(), vec!["west"]);
}

#[test]
fn presence_interval_served_by_green_is_marked_triggered() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor4": 6})).unwrap();
    junction.tick_at(1_000);
    junction.tick_at(1_500);
    assert_eq!(junction.phase_of("west"), Phase::Green);

    junction.ingest(1_800, json!({"sensor4": 200})).unwrap();
    let record = junction.presence_records().last().cloned().unwrap();
    assert_eq!(record.lane_id, "west");
    assert_eq!(record.detected_at, 100);
    assert_eq!(record.cleared_at, 1_800);
    assert!(record.triggered_change);
}

#[test]
fn overdue_lane_preempts_a_held_green() {
    let config = SignalConfig {
        min_green_ms: 1_000,
        max_green_ms: 20_000,
        max_red_ms: 3_000,
        ..quick_config()
    };
    let mut junction = TestIntersection::with_config(config);
    junction.ingest(100, json!({"sensor4": 6})).unwrap();

    // North stays occupied the whole time.
    for at in (500..3_000).step_by(500) {
        junction.ingest(at, json!({"sensor3": 2})).unwrap();
        assert_eq!(junction.phase_of("north"), Phase::Green, "held at {at}");
    }
    junction.ingest(3_000, json!({"sensor3": 2})).unwrap();

    assert_eq!(junction.phase_of("north"), Phase::Yellow);
    assert_eq!(junction.phase_of("west"), Phase::RedYellow);
    assert_eq!(junction.phase_changes()[0].reason, TransitionReason::MaxRedOverdue);
}

// ---------------------------------------------------------------------------
// Edge cases
// ---------------------------------------------------------------------------

#[test]
fn second_tick_at_same_time_is_a_noop() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor4": 8})).unwrap();
    junction.tick_at(1_300);
    let changes = junction.phase_changes().len();
    let published = junction.published_states().len();

    junction.tick_at(1_300);
    assert_eq!(junction.phase_changes().len(), changes);
    assert_eq!(junction.published_states().len(), published);
}

#[test]
fn unknown_sensors_and_garbled_values_are_harmless() {
    let mut junction = TestIntersection::with_config(quick_config());
    let before = junction.state();

    let outcome = junction
        .ingest(100, json!({"lidar-9": 1, "sensor2": "err", "sensor1": null}))
        .unwrap();
    assert!(outcome.transitions.is_empty());
    assert!(outcome.state.queue.is_empty());
    assert_eq!(junction.lane("south").last_sample_at, Some(100));
    assert_eq!(junction.lane("south").last_distance_cm, None);
    assert!(!junction.lane("east").is_occupied);
    assert_eq!(junction.state().lanes.len(), before.lanes.len());
    junction.assert_invariants();
}

#[test]
fn text_distances_are_parsed() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor2": "12.5"})).unwrap();
    assert!(junction.lane("south").is_occupied);
    assert_eq!(junction.lane("south").last_distance_cm, Some(12.5));
}

#[test]
fn bare_lane_id_addresses_that_lane() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"east": 2})).unwrap();
    assert_eq!(junction.queue(), vec!["east"]);
}

#[test]
fn invalid_event_is_rejected_without_side_effects() {
    let mut junction = TestIntersection::with_config(quick_config());
    let before = junction.state();
    let published = junction.published_states().len();

    let event = SensorEvent {
        sensors: json!({"sensor4": 2}),
        ..Default::default()
    };
    assert_eq!(junction.ingest_event(100, event), Err(IngestError::MissingDeviceId));
    assert_eq!(
        junction.ingest_event(100, SensorEvent::new("esp32", json!("sensor4=2"))),
        Err(IngestError::ReadingsNotMapping)
    );

    assert_eq!(junction.state().lanes, before.lanes);
    assert!(junction.queue().is_empty());
    assert_eq!(junction.published_states().len(), published);
}

#[test]
fn unknown_lane_lookup_is_not_found() {
    let junction = TestIntersection::new();
    assert!(junction.controller().lane_state("up").is_none());
}

#[test]
fn reset_restores_initial_state_and_announces() {
    let mut junction = TestIntersection::with_config(quick_config());
    junction.ingest(100, json!({"sensor4": 8, "sensor1": 8})).unwrap();
    junction.tick_at(1_300);
    junction.tick_at(1_900);
    let published = junction.published_states().len();

    junction.reset_at(5_000);
    let state = junction.state();
    assert_eq!(state.current_lane, "north");
    assert_eq!(junction.phase_of("north"), Phase::Green);
    assert!(state.queue.is_empty());
    for lane in ["west", "south", "east"] {
        assert_eq!(junction.lane(lane).red_since, Some(5_000));
        assert_eq!(junction.lane(lane).cycles_completed, 0);
    }
    assert_eq!(junction.published_states().len(), published + 1);
    junction.assert_invariants();
}
