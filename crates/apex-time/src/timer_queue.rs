use std::collections::{BTreeMap, HashMap};

/// Handle returned by [`TimerQueue::schedule`]; used to cancel a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer that has come due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent<E> {
    pub id: TimerId,
    pub deadline_ns: u64,
    pub event: E,
}

/// Deadline-ordered timer queue.
///
/// Timers with equal deadlines fire in the order they were scheduled, which keeps event
/// processing deterministic when several delays round to the same instant.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_id: u64,
    by_deadline: BTreeMap<(u64, TimerId), E>,
    deadlines: HashMap<TimerId, u64>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            by_deadline: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_deadline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }

    pub fn schedule(&mut self, deadline_ns: u64, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.by_deadline.insert((deadline_ns, id), event);
        self.deadlines.insert(id, deadline_ns);
        id
    }

    /// Cancel a pending timer. Returns the event if the timer had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<E> {
        let deadline_ns = self.deadlines.remove(&id)?;
        self.by_deadline.remove(&(deadline_ns, id))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.by_deadline.keys().next().map(|&(deadline_ns, _)| deadline_ns)
    }

    /// Pop the earliest timer whose deadline is `<= now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<TimerEvent<E>> {
        let (&(deadline_ns, id), _) = self.by_deadline.iter().next()?;
        if deadline_ns > now_ns {
            return None;
        }
        let event = self.by_deadline.remove(&(deadline_ns, id))?;
        self.deadlines.remove(&id);
        Some(TimerEvent {
            id,
            deadline_ns,
            event,
        })
    }

    /// Pop the earliest timer regardless of its deadline.
    pub fn pop_next(&mut self) -> Option<TimerEvent<E>> {
        let deadline_ns = self.next_deadline()?;
        self.pop_due(deadline_ns)
    }

    /// Drop every pending timer. Timer ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.by_deadline.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order_with_fifo_ties() {
        let mut q = TimerQueue::new();
        q.schedule(30, "c");
        q.schedule(10, "a");
        q.schedule(10, "b");

        assert_eq!(q.next_deadline(), Some(10));
        assert_eq!(q.pop_due(5), None);
        assert_eq!(q.pop_due(10).map(|t| t.event), Some("a"));
        assert_eq!(q.pop_due(10).map(|t| t.event), Some("b"));
        assert_eq!(q.pop_due(10), None);
        assert_eq!(q.pop_next().map(|t| (t.deadline_ns, t.event)), Some((30, "c")));
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_removes_only_the_target() {
        let mut q = TimerQueue::new();
        let a = q.schedule(10, 1u32);
        let b = q.schedule(20, 2u32);

        assert_eq!(q.cancel(a), Some(1));
        assert_eq!(q.cancel(a), None);
        assert_eq!(q.next_deadline(), Some(20));
        assert_eq!(q.cancel(b), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_clear() {
        let mut q = TimerQueue::new();
        let a = q.schedule(1, ());
        q.clear();
        let b = q.schedule(1, ());
        assert_ne!(a, b);
        assert_eq!(q.cancel(a), None);
        assert_eq!(q.len(), 1);
    }
}
