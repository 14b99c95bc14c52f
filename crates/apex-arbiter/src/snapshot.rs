use serde::Serialize;

use crate::phase::{ActiveOp, RecentGrant};
use crate::queue::QueueEntry;
use crate::rob::RobSlotView;
use crate::types::Sequence;

/// Read-only copy of the arbiter state for display. Taking one never mutates the arbiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbiterSnapshot {
    pub enabled: bool,
    pub active: bool,
    pub capacity: usize,
    pub next_sequence: Sequence,
    pub grant_count: u64,
    pub contention: f64,
    pub queue: Vec<QueueEntry>,
    pub rob: Vec<RobSlotView>,
    pub ops: Vec<ActiveOp>,
    pub recent_grants: Vec<RecentGrant>,
    pub passthrough_count: u32,
    pub removal_pending: bool,
}

impl ArbiterSnapshot {
    /// Index of the ROB slot for `sequence`, as drawn left to right.
    pub fn rob_slot_index(&self, sequence: Sequence) -> Option<usize> {
        self.rob.iter().position(|slot| slot.sequence == sequence)
    }

    pub fn queue_slot_index(&self, sequence: Sequence) -> Option<usize> {
        self.queue.iter().position(|entry| entry.sequence == sequence)
    }
}
