//! Bounded admission queue.
//!
//! A slot is occupied from admission until the request physically *departs* the arbiter's front
//! door, not merely until it is granted. Granted-but-not-departed entries therefore still count
//! toward [`AdmissionQueue::is_full`].

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::AdmissionError;
use crate::types::{AtomicKind, OriginId, Sequence};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub sequence: Sequence,
    pub origin: OriginId,
    pub kind: AtomicKind,
    pub granted: bool,
}

#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    capacity: usize,
    entries: VecDeque<QueueEntry>,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append a new ungranted entry at the tail.
    ///
    /// The caller supplies the sequence only after [`AdmissionQueue::is_full`] said there is
    /// room, so a rejection here never burns a sequence number.
    pub fn enqueue(
        &mut self,
        sequence: Sequence,
        origin: OriginId,
        kind: AtomicKind,
    ) -> Result<Sequence, AdmissionError> {
        if self.is_full() {
            return Err(AdmissionError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(QueueEntry {
            sequence,
            origin,
            kind,
            granted: false,
        });
        Ok(sequence)
    }

    pub fn get(&self, sequence: Sequence) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }

    /// Flag the entry as granted without removing it. Returns `false` if it is gone already or
    /// was granted before.
    pub fn mark_granted(&mut self, sequence: Sequence) -> bool {
        match self.entries.iter_mut().find(|e| e.sequence == sequence) {
            Some(entry) if !entry.granted => {
                entry.granted = true;
                true
            }
            _ => false,
        }
    }

    /// Remove the entry, freeing its back-pressure slot.
    pub fn departed(&mut self, sequence: Sequence) -> Option<QueueEntry> {
        let idx = self.entries.iter().position(|e| e.sequence == sequence)?;
        self.entries.remove(idx)
    }

    /// Lowest sequence that has not been granted yet.
    pub fn oldest_ungranted(&self) -> Option<Sequence> {
        self.entries
            .iter()
            .filter(|e| !e.granted)
            .map(|e| e.sequence)
            .min()
    }

    /// Normalized back-pressure signal in `[0, 1]`.
    pub fn contention(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        (self.entries.len() as f64 / self.capacity as f64).min(1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
