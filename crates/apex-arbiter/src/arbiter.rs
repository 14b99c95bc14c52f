//! Arbiter controller.
//!
//! Owns the sequence generator, admission queue and reorder buffer and exposes the
//! admit / grant / depart / complete / retire protocol. Grant *policy* lives with the caller
//! (see [`crate::storm::GrantPolicy`]); the controller only enforces capacity and in-order
//! retirement.

use apex_time::{TimerId, TimerQueue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, trace};

use crate::config::{ArbiterConfig, RECENT_GRANTS_LEN};
use crate::error::{AdmissionError, ConfigError, InvariantViolation};
use crate::notify::{OnRetired, RetireTicket};
use crate::phase::{ActiveOp, OpPhase, RecentGrant};
use crate::queue::AdmissionQueue;
use crate::rob::{MarkOutcome, ReorderBuffer, SlotState};
use crate::seq::SequenceGenerator;
use crate::snapshot::ArbiterSnapshot;
use crate::types::{AtomicKind, OriginId, Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArbiterTimer {
    RemoveHead(Sequence),
}

#[derive(Debug)]
pub struct Arbiter {
    config: ArbiterConfig,
    seq: SequenceGenerator,
    queue: AdmissionQueue,
    rob: ReorderBuffer,
    grant_count: u64,
    active: bool,
    ops: Vec<ActiveOp>,
    recent_grants: Vec<RecentGrant>,
    passthrough_count: u32,

    now_ns: u64,
    timers: TimerQueue<ArbiterTimer>,
    /// Removal timer for a `Done` head. At most one exists at a time.
    pending_removal: Option<TimerId>,

    last_retired: Option<Sequence>,
    order_violation: Option<InvariantViolation>,
    rng: StdRng,
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::build(ArbiterConfig::default())
    }
}

impl Arbiter {
    pub fn new(config: ArbiterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ArbiterConfig) -> Self {
        Self {
            config,
            seq: SequenceGenerator::new(),
            queue: AdmissionQueue::new(config.capacity),
            rob: ReorderBuffer::new(),
            grant_count: 0,
            active: false,
            ops: Vec::new(),
            recent_grants: Vec::with_capacity(RECENT_GRANTS_LEN + 1),
            passthrough_count: 0,
            now_ns: 0,
            timers: TimerQueue::new(),
            pending_removal: None,
            last_retired: None,
            order_violation: None,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Switch the arbiter on or off. Changing the mode resets all state, the same way switching
    /// architecture restarts the demo.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled == enabled {
            return;
        }
        self.config.enabled = enabled;
        self.reset();
    }

    /// Return to the initial empty state. Queued callbacks are dropped without firing.
    pub fn reset(&mut self) {
        self.seq.reset();
        self.queue.clear();
        self.rob.clear();
        self.grant_count = 0;
        self.active = false;
        self.ops.clear();
        self.recent_grants.clear();
        self.passthrough_count = 0;
        self.timers.clear();
        self.pending_removal = None;
        self.last_retired = None;
        self.order_violation = None;
        self.rng = StdRng::seed_from_u64(self.config.seed);
        debug!("arbiter reset");
    }

    /// Admit a request. Rejection is side-effect free and consumes no sequence number.
    pub fn enqueue_request(
        &mut self,
        origin: OriginId,
        kind: AtomicKind,
    ) -> Result<Sequence, AdmissionError> {
        if !self.config.enabled {
            return Err(AdmissionError::Disabled);
        }
        if self.queue.is_full() {
            trace!(%origin, len = self.queue.len(), "admission rejected: queue full");
            return Err(AdmissionError::QueueFull {
                capacity: self.queue.capacity(),
            });
        }

        let sequence = self.seq.next();
        self.queue.enqueue(sequence, origin, kind)?;
        self.rob.push(sequence, origin);
        self.ops.push(ActiveOp {
            sequence,
            origin,
            phase: OpPhase::Queued,
            phase_start_ns: self.now_ns,
        });
        self.active = true;
        debug!(%sequence, %origin, %kind, queue_len = self.queue.len(), "admitted");
        self.debug_check();
        Ok(sequence)
    }

    /// Mark `sequence` as granted. The queue slot stays occupied until [`Arbiter::departed`].
    ///
    /// Returns `false` (and changes nothing) if the entry is no longer queued.
    pub fn grant(&mut self, sequence: Sequence) -> bool {
        if !self.config.enabled || !self.queue.mark_granted(sequence) {
            return false;
        }
        self.grant_count += 1;

        let jitter: f64 = self.rng.gen_range(0.0..6.0);
        let cycles = (2.0 + self.queue.len() as f64 * 8.0 + jitter).round() as u32;
        self.recent_grants.insert(0, RecentGrant { sequence, cycles });
        self.recent_grants.truncate(RECENT_GRANTS_LEN);

        self.set_phase(sequence, OpPhase::Granted);
        debug!(%sequence, grant_count = self.grant_count, cycles, "granted");
        true
    }

    /// The granted request physically left the admission path; its queue slot frees up.
    pub fn departed(&mut self, sequence: Sequence) -> bool {
        if !self.config.enabled || self.queue.departed(sequence).is_none() {
            return false;
        }
        self.set_phase(sequence, OpPhase::Rmw);
        debug!(%sequence, queue_len = self.queue.len(), "departed");
        self.refresh_active();
        self.debug_check();
        true
    }

    /// The remote read-modify-write finished; its acknowledgement is travelling back.
    pub fn mark_l2_done(&mut self, sequence: Sequence) -> bool {
        self.set_phase(sequence, OpPhase::Ack)
    }

    /// Record the completion and retire whatever became retirable.
    ///
    /// `on_retired` fires exactly once, when this slot reaches the ROB head. Unknown or
    /// duplicate sequences are ignored (the callback is dropped). A disabled arbiter fires the
    /// callback immediately.
    pub fn report_completion(&mut self, sequence: Sequence, on_retired: OnRetired) {
        if !self.config.enabled {
            on_retired();
            return;
        }
        match self.rob.mark_complete(sequence, on_retired) {
            MarkOutcome::Completed { at_head } => {
                self.set_phase(sequence, OpPhase::Retiring);
                debug!(%sequence, at_head, "completion reported");
            }
            MarkOutcome::Duplicate => {
                trace!(%sequence, "duplicate completion ignored");
            }
            MarkOutcome::Unknown => {
                trace!(%sequence, "stale completion ignored");
            }
        }
        self.try_drain();
    }

    /// Like [`Arbiter::report_completion`], but returns a future that resolves at retirement.
    pub fn report_completion_future(&mut self, sequence: Sequence) -> RetireTicket {
        let (ticket, on_retired) = RetireTicket::pair();
        self.report_completion(sequence, on_retired);
        ticket
    }

    /// Retire the ROB head if it is complete and keep going while the next head is too.
    ///
    /// Safe to call speculatively; does nothing when the head is pending or a removal is already
    /// scheduled.
    pub fn try_drain(&mut self) {
        loop {
            match self.rob.head_state() {
                None | Some(SlotState::Pending) => break,
                // Removal already scheduled; the timer resumes the cascade.
                Some(SlotState::Done) => break,
                Some(SlotState::Complete) => {}
            }

            let Some((sequence, on_retired)) = self.rob.retire_head() else {
                break;
            };
            self.note_retired(sequence);
            debug!(%sequence, "retired");

            // The slot's removal is settled before the callback runs, so a callback that panics
            // leaves the buffer drainable.
            let settled = self.config.settle_delay_ns == 0;
            if settled {
                self.remove_head(sequence);
            } else if self.pending_removal.is_none() {
                let deadline = self.now_ns.saturating_add(self.config.settle_delay_ns);
                let id = self
                    .timers
                    .schedule(deadline, ArbiterTimer::RemoveHead(sequence));
                self.pending_removal = Some(id);
            }
            if let Some(cb) = on_retired {
                cb();
            }
            if !settled {
                break;
            }
        }
        self.refresh_active();
        self.debug_check();
    }

    /// Advance virtual time, removing settled heads and continuing the drain cascade.
    pub fn advance_to(&mut self, now_ns: u64) {
        if now_ns > self.now_ns {
            self.now_ns = now_ns;
        }
        while let Some(due) = self.timers.pop_due(self.now_ns) {
            match due.event {
                ArbiterTimer::RemoveHead(sequence) => {
                    if self.pending_removal == Some(due.id) {
                        self.pending_removal = None;
                    }
                    self.remove_head(sequence);
                    self.try_drain();
                }
            }
        }
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Deadline of the next settle timer, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Drop a request that has not retired yet, without firing its callback.
    ///
    /// Returns `false` if the sequence is unknown or already retired.
    pub fn cancel(&mut self, sequence: Sequence) -> bool {
        if self.rob.remove_unretired(sequence).is_none() {
            return false;
        }
        self.queue.departed(sequence);
        self.ops.retain(|op| op.sequence != sequence);
        debug!(%sequence, "cancelled");
        // The cancelled slot may have been the one blocking the head.
        self.try_drain();
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn contention(&self) -> f64 {
        self.queue.contention()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn grant_count(&self) -> u64 {
        self.grant_count
    }

    pub fn next_sequence(&self) -> Sequence {
        self.seq.peek()
    }

    pub fn oldest_ungranted(&self) -> Option<Sequence> {
        self.queue.oldest_ungranted()
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    pub fn rob(&self) -> &ReorderBuffer {
        &self.rob
    }

    pub fn ops(&self) -> &[ActiveOp] {
        &self.ops
    }

    pub fn recent_grants(&self) -> &[RecentGrant] {
        &self.recent_grants
    }

    pub fn begin_passthrough(&mut self) {
        self.passthrough_count = self.passthrough_count.saturating_add(1);
    }

    pub fn end_passthrough(&mut self) {
        self.passthrough_count = self.passthrough_count.saturating_sub(1);
    }

    pub fn passthrough_count(&self) -> u32 {
        self.passthrough_count
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            enabled: self.config.enabled,
            active: self.active,
            capacity: self.queue.capacity(),
            next_sequence: self.seq.peek(),
            grant_count: self.grant_count,
            contention: self.contention(),
            queue: self.queue.iter().cloned().collect(),
            rob: self.rob.iter().map(|slot| slot.view()).collect(),
            ops: self.ops.clone(),
            recent_grants: self.recent_grants.clone(),
            passthrough_count: self.passthrough_count,
            removal_pending: self.pending_removal.is_some(),
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some(violation) = &self.order_violation {
            return Err(violation.clone());
        }
        if self.queue.len() > self.queue.capacity() {
            return Err(InvariantViolation::QueueOverCapacity {
                len: self.queue.len(),
                capacity: self.queue.capacity(),
            });
        }

        let next = self.seq.peek();
        let mut prev: Option<Sequence> = None;
        for entry in self.queue.iter() {
            if let Some(prev) = prev {
                if prev >= entry.sequence {
                    return Err(InvariantViolation::QueueOutOfOrder {
                        prev,
                        next: entry.sequence,
                    });
                }
            }
            if entry.sequence >= next {
                return Err(InvariantViolation::SequenceFromFuture {
                    sequence: entry.sequence,
                    next,
                });
            }
            if self.rob.get(entry.sequence).is_none() {
                return Err(InvariantViolation::OrphanQueueEntry(entry.sequence));
            }
            prev = Some(entry.sequence);
        }

        let mut prev: Option<Sequence> = None;
        for (idx, slot) in self.rob.iter().enumerate() {
            if let Some(prev) = prev {
                if prev >= slot.sequence() {
                    return Err(InvariantViolation::RobOutOfOrder {
                        prev,
                        next: slot.sequence(),
                    });
                }
            }
            if slot.sequence() >= next {
                return Err(InvariantViolation::SequenceFromFuture {
                    sequence: slot.sequence(),
                    next,
                });
            }
            if slot.state() == SlotState::Done {
                if idx != 0 {
                    return Err(InvariantViolation::DoneBehindHead(slot.sequence()));
                }
                if self.pending_removal.is_none() {
                    return Err(InvariantViolation::DoneWithoutRemoval(slot.sequence()));
                }
            }
            prev = Some(slot.sequence());
        }

        let expect_active = !self.queue.is_empty() || !self.rob.is_empty();
        if self.active != expect_active {
            return Err(InvariantViolation::ActiveFlagStale {
                active: self.active,
                queue_len: self.queue.len(),
                rob_len: self.rob.len(),
            });
        }
        Ok(())
    }

    fn remove_head(&mut self, sequence: Sequence) {
        match self.rob.head() {
            Some(head) if head.sequence() == sequence => {}
            // Reset or cancel got there first.
            _ => return,
        }
        if self.rob.remove_done_head().is_some() {
            // A completion can race its departure notice; the queue slot goes with the ROB slot.
            self.queue.departed(sequence);
            self.ops.retain(|op| op.sequence != sequence);
            trace!(%sequence, rob_len = self.rob.len(), "slot removed");
        }
        self.refresh_active();
    }

    fn note_retired(&mut self, sequence: Sequence) {
        if let Some(previous) = self.last_retired {
            if previous >= sequence && self.order_violation.is_none() {
                error!(%previous, %sequence, "retirement out of order");
                self.order_violation = Some(InvariantViolation::RetiredOutOfOrder {
                    previous,
                    retired: sequence,
                });
            }
        }
        self.last_retired = Some(sequence);
    }

    fn set_phase(&mut self, sequence: Sequence, phase: OpPhase) -> bool {
        match self.ops.iter_mut().find(|op| op.sequence == sequence) {
            Some(op) => {
                op.phase = phase;
                op.phase_start_ns = self.now_ns;
                trace!(%sequence, %phase, "phase change");
                true
            }
            None => false,
        }
    }

    fn refresh_active(&mut self) {
        self.active = !self.queue.is_empty() || !self.rob.is_empty();
    }

    #[inline]
    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            if let Err(violation) = self.check_invariants() {
                panic!("arbiter invariant violated: {violation}");
            }
        }
    }
}
