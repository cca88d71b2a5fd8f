//! What Bevy-side subscribers see through `SignalPlugin` events.

use std::time::Duration;

use bevy::prelude::*;
use serde_json::json;

use crate::lanes::Phase;
use crate::signal_plugin::{SensorInbox, SignalController, DEFAULT_TICK_INTERVAL};
use crate::snapshot::Connectivity;
use crate::test_harness::TestIntersection;
use crate::SignalConfig;

fn config() -> SignalConfig {
    SignalConfig {
        min_green_ms: 1_000,
        max_green_ms: 2_000,
        yellow_ms: 500,
        ..Default::default()
    }
}

#[test]
fn fixed_timestep_matches_tick_interval() {
    let mut junction = TestIntersection::new();
    let timestep = junction
        .app_mut()
        .world()
        .resource::<Time<Fixed>>()
        .timestep();
    assert_eq!(timestep, DEFAULT_TICK_INTERVAL);
    assert_eq!(DEFAULT_TICK_INTERVAL, Duration::from_millis(250));
}

#[test]
fn one_snapshot_per_changing_step() {
    let mut junction = TestIntersection::with_config(config());
    let start = junction.published_states().len();

    junction.ingest(100, json!({"sensor4": 8})).unwrap();
    junction.tick_at(500);
    junction.tick_at(1_000);
    junction.tick_at(1_500);

    let published = &junction.published_states()[start..];
    assert_eq!(published.len(), 3, "ingest, handover and commit");
    assert_eq!(published[0].queue, vec!["west"]);
    assert_eq!(published[1].lane("west").map(|l| l.phase), Some(Phase::RedYellow));
    assert_eq!(published[2].current_lane, "west");
    assert_eq!(published[2].timestamp, 1_500);
}

#[test]
fn phase_change_events_follow_commit_order() {
    let mut junction = TestIntersection::with_config(config());
    junction.ingest(100, json!({"sensor2": 8})).unwrap();
    junction.tick_at(1_000);
    junction.tick_at(1_500);

    let lanes_and_phases: Vec<_> = junction
        .phase_changes()
        .iter()
        .map(|r| (r.lane_id.as_str(), r.next))
        .collect();
    assert_eq!(
        lanes_and_phases,
        vec![
            ("north", Phase::Yellow),
            ("south", Phase::RedYellow),
            ("north", Phase::Red),
            ("south", Phase::Green),
        ]
    );
}

#[test]
fn presence_closed_events_are_published() {
    let mut junction = TestIntersection::with_config(config());
    junction.ingest(100, json!({"sensor1": 5})).unwrap();
    junction.ingest(400, json!({"sensor1": 90})).unwrap();

    let records = junction.presence_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lane_id, "east");
    assert_eq!(records[0].detected_at, 100);
    assert_eq!(records[0].cleared_at, 400);
}

#[test]
fn inbox_events_apply_in_arrival_order_within_one_step() {
    let mut junction = TestIntersection::with_config(config());
    {
        let world = junction.app_mut().world_mut();
        let mut inbox = world.resource_mut::<SensorInbox>();
        inbox.push(crate::readings::SensorEvent::new("a", json!({"sensor1": 5})));
        inbox.push(crate::readings::SensorEvent::new("b", json!({"sensor1": 200})));
        inbox.push(crate::readings::SensorEvent::new("c", json!({"sensor4": 5})));
    }
    junction.tick_at(100);

    assert_eq!(junction.queue(), vec!["west"]);
    assert_eq!(junction.presence_records().len(), 1);
}

#[test]
fn connectivity_flags_appear_in_snapshots() {
    let mut junction = TestIntersection::new();
    junction
        .app_mut()
        .world_mut()
        .resource_mut::<SignalController>()
        .set_connectivity(Connectivity {
            database_connected: false,
            device_connected: true,
        });
    junction.ingest(100, json!({"sensor2": 3})).unwrap();

    let last = junction.published_states().last().cloned().unwrap();
    assert!(last.connectivity.device_connected);
    assert!(!last.connectivity.database_connected);
}
