//! Fairness queue: lanes with an active call, in the order they called.
//!
//! An insertion-ordered set over lane indices. Membership is tracked in a
//! per-lane flag so duplicate checks are O(1); removal works from any
//! position because overdue preemption can serve a lane out of order.

use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct FairnessQueue {
    order: VecDeque<usize>,
    members: Vec<bool>,
}

impl FairnessQueue {
    pub fn new(lane_count: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(lane_count),
            members: vec![false; lane_count],
        }
    }

    #[inline]
    pub fn contains(&self, lane: usize) -> bool {
        self.members.get(lane).copied().unwrap_or(false)
    }

    /// Append `lane` unless it is already waiting. Returns `true` if added.
    pub fn push(&mut self, lane: usize) -> bool {
        if lane >= self.members.len() || self.members[lane] {
            return false;
        }
        self.members[lane] = true;
        self.order.push_back(lane);
        true
    }

    /// Remove `lane` wherever it sits. Returns `true` if it was queued.
    pub fn remove(&mut self, lane: usize) -> bool {
        if !self.contains(lane) {
            return false;
        }
        self.members[lane] = false;
        self.order.retain(|&queued| queued != lane);
        true
    }

    /// Pop entries from the head until one other than `skip` turns up.
    /// Skipped entries are dropped, not re-queued.
    pub fn pop_front_except(&mut self, skip: usize) -> Option<usize> {
        while let Some(lane) = self.order.pop_front() {
            self.members[lane] = false;
            if lane != skip {
                return Some(lane);
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
