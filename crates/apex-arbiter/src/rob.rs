//! Reorder buffer.
//!
//! Slots are kept in strict sequence order and only the head (index 0) may retire. A slot that
//! completes early waits behind every earlier, still-pending slot.
//!
//! The buffer has no admission bound of its own. It holds every queued request plus every
//! departed request that has not retired yet, so its depth follows the admission queue and the
//! caller's grant flow.

use core::fmt;
use std::collections::VecDeque;

use serde::Serialize;

use crate::notify::OnRetired;
use crate::types::{OriginId, Sequence};

/// Per-slot progress, totally ordered: `Pending < Complete < Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    /// Admitted; the remote operation has not reported back yet.
    Pending,
    /// Result is available but earlier slots have not retired.
    Complete,
    /// Retired (callback fired); waiting for removal.
    Done,
}

pub struct RobSlot {
    sequence: Sequence,
    origin: OriginId,
    state: SlotState,
    on_retired: Option<OnRetired>,
}

impl RobSlot {
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn view(&self) -> RobSlotView {
        RobSlotView {
            sequence: self.sequence,
            origin: self.origin,
            state: self.state,
        }
    }
}

impl fmt::Debug for RobSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobSlot")
            .field("sequence", &self.sequence)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .field("has_callback", &self.on_retired.is_some())
            .finish()
    }
}

/// Read-only copy of a slot for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RobSlotView {
    pub sequence: Sequence,
    pub origin: OriginId,
    pub state: SlotState,
}

/// What [`ReorderBuffer::mark_complete`] did with a completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Slot flipped to `Complete`; `at_head` says whether it can retire right away.
    Completed { at_head: bool },
    /// Slot already complete or done: duplicate report, callback dropped.
    Duplicate,
    /// No slot with that sequence: stale report, callback dropped.
    Unknown,
}

#[derive(Default)]
pub struct ReorderBuffer {
    slots: VecDeque<RobSlot>,
}

impl fmt::Debug for ReorderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReorderBuffer")
            .field("slots", &self.slots)
            .finish()
    }
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a pending slot. Sequences must arrive in ascending order.
    pub fn push(&mut self, sequence: Sequence, origin: OriginId) {
        debug_assert!(
            self.slots.back().map_or(true, |s| s.sequence < sequence),
            "ROB push out of order"
        );
        self.slots.push_back(RobSlot {
            sequence,
            origin,
            state: SlotState::Pending,
            on_retired: None,
        });
    }

    pub fn head(&self) -> Option<&RobSlot> {
        self.slots.front()
    }

    pub fn head_state(&self) -> Option<SlotState> {
        self.slots.front().map(|s| s.state)
    }

    pub fn get(&self, sequence: Sequence) -> Option<&RobSlot> {
        self.position(sequence).map(|idx| &self.slots[idx])
    }

    /// Index of `sequence` counted from the head.
    pub fn position(&self, sequence: Sequence) -> Option<usize> {
        self.slots
            .binary_search_by_key(&sequence, |s| s.sequence)
            .ok()
    }

    /// Record that the remote operation finished and capture the retirement callback.
    pub fn mark_complete(&mut self, sequence: Sequence, on_retired: OnRetired) -> MarkOutcome {
        let Some(idx) = self.position(sequence) else {
            return MarkOutcome::Unknown;
        };
        let slot = &mut self.slots[idx];
        if slot.state != SlotState::Pending {
            return MarkOutcome::Duplicate;
        }
        slot.state = SlotState::Complete;
        slot.on_retired = Some(on_retired);
        MarkOutcome::Completed { at_head: idx == 0 }
    }

    /// Flip a `Complete` head to `Done` and hand back its callback.
    ///
    /// Returns `None` when the head is missing, still pending, or already done.
    pub fn retire_head(&mut self) -> Option<(Sequence, Option<OnRetired>)> {
        let head = self.slots.front_mut()?;
        if head.state != SlotState::Complete {
            return None;
        }
        head.state = SlotState::Done;
        Some((head.sequence, head.on_retired.take()))
    }

    /// Pop the head if it has retired.
    pub fn remove_done_head(&mut self) -> Option<RobSlot> {
        if self.head_state() != Some(SlotState::Done) {
            return None;
        }
        self.slots.pop_front()
    }

    /// Remove a slot that has not retired yet. The callback is dropped without firing.
    pub fn remove_unretired(&mut self, sequence: Sequence) -> Option<RobSlot> {
        let idx = self.position(sequence)?;
        if self.slots[idx].state == SlotState::Done {
            return None;
        }
        self.slots.remove(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RobSlot> + '_ {
        self.slots.iter()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
