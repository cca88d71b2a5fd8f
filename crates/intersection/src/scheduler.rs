//! Phase scheduler: the signal state machine.
//!
//! Only the current lane is evaluated. While it is green the scheduler
//! decides whether to hand over (min/max green, hysteresis holds, overdue
//! lanes); once it is yellow the handover commits after the yellow interval.
//!
//! ```text
//! green --(handover)--> yellow --(yellow elapsed)--> red
//! red   --(chosen)----> red_yellow --(yellow elapsed)--> green
//! ```
//!
//! Successor priority: overdue lane (earliest `red_since`), then the head of
//! the fairness queue, then the next lane in configured order.

use bevy::log::{debug, warn};

use crate::config::SignalConfig;
use crate::fairness::FairnessQueue;
use crate::lanes::{LaneState, LaneStore, Phase};
use crate::records::{PhaseChangeRecord, TransitionReason};
use crate::Millis;

/// How a successor lane was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessorSource {
    Overdue,
    Queue,
    RoundRobin,
}

/// Timing facts about the green lane at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreenAssessment {
    pub elapsed_ms: Millis,
    /// Occupied, or recently saw a vehicle, or recently cleared.
    pub hold_due_to_vehicle: bool,
    /// A vehicle came and went this cycle and nothing holds the lane.
    pub can_ignore_min_green: bool,
}

#[derive(Debug, Clone)]
pub struct PhaseScheduler {
    current: usize,
    successor: Option<usize>,
    lane_count: usize,
    min_green_ms: Millis,
    max_green_ms: Millis,
    yellow_ms: Millis,
    max_red_ms: Millis,
    hold_after_clear_ms: Millis,
    vehicle_presence_grace_ms: Millis,
}

impl PhaseScheduler {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            current: 0,
            successor: None,
            lane_count: config.lanes.len(),
            min_green_ms: config.min_green_ms,
            max_green_ms: config.max_green_ms,
            yellow_ms: config.yellow_ms,
            max_red_ms: config.max_red_ms,
            hold_after_clear_ms: config.hold_after_clear_ms,
            vehicle_presence_grace_ms: config.vehicle_presence_grace_ms,
        }
    }

    /// Point back at the first lane with no handover in progress.
    pub fn reset(&mut self) {
        self.current = 0;
        self.successor = None;
    }

    /// Lane currently green or yellow.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Lane primed to receive green, if a handover is in progress.
    pub fn successor(&self) -> Option<usize> {
        self.successor
    }

    pub fn assess_green(&self, lane: &LaneState, now: Millis) -> GreenAssessment {
        let elapsed_ms = now.saturating_sub(lane.last_change_at);
        let since_vehicle = lane.last_vehicle_at.map(|t| now.saturating_sub(t));
        let since_clear = lane.last_cleared_at.map(|t| now.saturating_sub(t));

        let hold_due_to_vehicle = lane.is_occupied
            || since_vehicle.is_some_and(|d| d <= self.vehicle_presence_grace_ms)
            || since_clear.is_some_and(|d| d <= self.hold_after_clear_ms);
        let had_vehicle_this_cycle = lane
            .last_vehicle_at
            .is_some_and(|seen| seen >= lane.last_change_at);

        GreenAssessment {
            elapsed_ms,
            hold_due_to_vehicle,
            can_ignore_min_green: had_vehicle_this_cycle && !hold_due_to_vehicle,
        }
    }

    /// A queued red lane other than the current one that has been red for at
    /// least `max_red_ms`. Ties go to the longest red, then configured order.
    pub fn find_overdue(
        &self,
        now: Millis,
        lanes: &LaneStore,
        queue: &FairnessQueue,
    ) -> Option<usize> {
        (0..lanes.len())
            .filter(|&i| i != self.current && queue.contains(i))
            .filter_map(|i| {
                let lane = lanes.get(i);
                match (lane.phase, lane.red_since) {
                    (Phase::Red, Some(since)) if now.saturating_sub(since) >= self.max_red_ms => {
                        Some((since, i))
                    }
                    _ => None,
                }
            })
            .min()
            .map(|(_, i)| i)
    }

    /// Pick the lane that receives green next and take it off the queue.
    pub fn choose_successor(
        &self,
        now: Millis,
        lanes: &LaneStore,
        queue: &mut FairnessQueue,
    ) -> (usize, SuccessorSource) {
        if let Some(overdue) = self.find_overdue(now, lanes, queue) {
            queue.remove(overdue);
            return (overdue, SuccessorSource::Overdue);
        }
        if let Some(queued) = queue.pop_front_except(self.current) {
            return (queued, SuccessorSource::Queue);
        }
        ((self.current + 1) % self.lane_count, SuccessorSource::RoundRobin)
    }

    /// Evaluate the current lane at `now` and commit any due transitions.
    pub fn evaluate(
        &mut self,
        now: Millis,
        lanes: &mut LaneStore,
        queue: &mut FairnessQueue,
    ) -> Vec<PhaseChangeRecord> {
        let mut transitions = Vec::new();

        match lanes.get(self.current).phase {
            Phase::Green => {
                let green = self.assess_green(lanes.get(self.current), now);
                let overdue = self.find_overdue(now, lanes, queue);
                let enforce_max_green = green.elapsed_ms >= self.max_green_ms;
                let enforce_max_red = overdue.is_some() && green.elapsed_ms >= self.min_green_ms;

                let reason = if enforce_max_green {
                    TransitionReason::MaxGreenElapsed
                } else if enforce_max_red {
                    TransitionReason::MaxRedOverdue
                } else if green.elapsed_ms < self.min_green_ms && !green.can_ignore_min_green {
                    return transitions;
                } else if green.hold_due_to_vehicle && overdue.is_none() {
                    return transitions;
                } else {
                    TransitionReason::MinGreenElapsed
                };

                self.begin_handover(now, reason, lanes, queue, &mut transitions);
            }
            Phase::Yellow => {
                let elapsed = now.saturating_sub(lanes.get(self.current).last_change_at);
                if elapsed >= self.yellow_ms {
                    self.commit_handover(now, lanes, queue, &mut transitions);
                }
            }
            Phase::Red | Phase::RedYellow => {}
        }

        transitions
    }

    fn begin_handover(
        &mut self,
        now: Millis,
        reason: TransitionReason,
        lanes: &mut LaneStore,
        queue: &mut FairnessQueue,
        transitions: &mut Vec<PhaseChangeRecord>,
    ) {
        let (next, source) = self.choose_successor(now, lanes, queue);
        debug!(
            "handover {} -> {} ({}, successor via {:?})",
            lanes.get(self.current).id,
            lanes.get(next).id,
            reason.label(),
            source
        );
        self.successor = Some(next);
        transitions.extend(change_phase(lanes, queue, self.current, Phase::Yellow, now, reason));
        transitions.extend(change_phase(
            lanes,
            queue,
            next,
            Phase::RedYellow,
            now,
            TransitionReason::PreparingForGreen,
        ));
    }

    fn commit_handover(
        &mut self,
        now: Millis,
        lanes: &mut LaneStore,
        queue: &mut FairnessQueue,
        transitions: &mut Vec<PhaseChangeRecord>,
    ) {
        let next = match self.successor.take() {
            Some(next) => next,
            None => {
                warn!(
                    "lane {} finished yellow with no successor primed; choosing one now",
                    lanes.get(self.current).id
                );
                self.choose_successor(now, lanes, queue).0
            }
        };

        let outgoing = self.current;
        transitions.extend(change_phase(
            lanes,
            queue,
            outgoing,
            Phase::Red,
            now,
            TransitionReason::YellowElapsed,
        ));
        transitions.extend(change_phase(
            lanes,
            queue,
            next,
            Phase::Green,
            now,
            TransitionReason::YellowElapsed,
        ));
        self.current = next;
        debug!("lane {} is green", lanes.get(next).id);
    }
}

/// Move one lane to `next` and maintain the per-phase bookkeeping.
/// Returns `None` when the lane is already in that phase.
pub fn change_phase(
    lanes: &mut LaneStore,
    queue: &mut FairnessQueue,
    index: usize,
    next: Phase,
    now: Millis,
    reason: TransitionReason,
) -> Option<PhaseChangeRecord> {
    let lane = lanes.get_mut(index);
    if lane.phase == next {
        return None;
    }

    let previous = lane.phase;
    let started_at = lane.last_change_at;
    lane.phase = next;
    lane.last_change_at = now;

    match next {
        Phase::Green => {
            lane.cycles_completed += 1;
            lane.red_since = None;
            if lane.presence_started_at.is_some() {
                lane.presence_triggered_change = true;
            }
            queue.remove(index);
        }
        Phase::Red => lane.red_since = Some(now),
        Phase::Yellow | Phase::RedYellow => lane.red_since = None,
    }

    Some(PhaseChangeRecord {
        lane_id: lane.id.clone(),
        previous,
        next,
        started_at,
        ended_at: now,
        duration_ms: now.saturating_sub(started_at),
        reason,
    })
}
