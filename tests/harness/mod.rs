#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use apex_arbiter::{Arbiter, ArbiterConfig, AtomicKind, OriginId, Sequence};
use apex_time::{TimerQueue, VirtualClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimal GPU model: SMs submit atomics, the arbiter grants FIFO and L2 answers after a random
/// latency.
pub struct SimGpu {
    pub arbiter: Arbiter,
    clock: VirtualClock,
    l2: TimerQueue<Sequence>,
    rng: StdRng,
    max_latency_ns: u64,
    retired: Arc<Mutex<Vec<Sequence>>>,
}

impl SimGpu {
    pub fn new(config: ArbiterConfig, seed: u64, max_latency_ns: u64) -> Result<Self> {
        Ok(Self {
            arbiter: Arbiter::new(config)?,
            clock: VirtualClock::new(),
            l2: TimerQueue::new(),
            rng: StdRng::seed_from_u64(seed),
            max_latency_ns,
            retired: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Admit, grant and dispatch one atomic. Returns `None` on back-pressure.
    pub fn submit(&mut self, origin: OriginId, kind: AtomicKind) -> Option<Sequence> {
        let sequence = self.arbiter.enqueue_request(origin, kind).ok()?;
        while let Some(next) = self.arbiter.oldest_ungranted() {
            self.arbiter.grant(next);
            self.arbiter.departed(next);
            let latency = self.rng.gen_range(1..=self.max_latency_ns);
            self.l2.schedule(self.clock.now_ns() + latency, next);
        }
        Some(sequence)
    }

    /// Deliver L2 results and settle timers until the arbiter is idle.
    pub fn run_until_idle(&mut self) -> Result<()> {
        loop {
            let next = match (self.l2.next_deadline(), self.arbiter.next_deadline()) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => break,
            };
            let now = self.clock.advance_to(next);
            self.arbiter.advance_to(now);
            while let Some(due) = self.l2.pop_due(now) {
                let log = Arc::clone(&self.retired);
                let sequence = due.event;
                self.arbiter.report_completion(
                    sequence,
                    Box::new(move || {
                        if let Ok(mut log) = log.lock() {
                            log.push(sequence);
                        }
                    }),
                );
            }
            self.arbiter.check_invariants()?;
        }
        if self.arbiter.is_active() {
            bail!("arbiter still active with no pending events");
        }
        Ok(())
    }

    pub fn take_retired(&mut self) -> Vec<Sequence> {
        match self.retired.lock() {
            Ok(mut log) => std::mem::take(&mut *log),
            Err(_) => Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.l2.clear();
        self.take_retired();
    }
}
