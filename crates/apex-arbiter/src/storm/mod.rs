//! Atomic storm: every SM fires an `atomicAdd` at the same address at once.
//!
//! This is the reference orchestration for the arbiter. It runs on virtual time and drives the
//! controller through the full protocol:
//!
//! 1. ATOM travels SM → bus → arbiter and is admitted (or stalls and retries on back-pressure).
//! 2. The [`GrantPolicy`] picks the next request; at most `max_grants_in_flight` grants occupy
//!    the arbiter body at once.
//! 3. GRANT reaches the SM, the request departs the queue and the RMW crosses the arbiter body
//!    to L2.
//! 4. L2 finishes after a bimodal latency and the ACK travels back; the completion is reported.
//! 5. The ROB retires results strictly in sequence order; each retirement sends DATA to its SM.

mod config;
mod policy;
mod trace;

use std::sync::mpsc;

use apex_time::{TimerQueue, VirtualClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::arbiter::Arbiter;
use crate::error::ConfigError;
use crate::types::{AtomicKind, OriginId, Sequence};

pub use config::{NsRange, StormConfig, StormMode};
pub use policy::{FifoGrantPolicy, GrantPolicy};
pub use trace::{NoopObserver, StormObserver, TraceEvent, TraceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StormTimer {
    Launch(OriginId),
    Arrive(OriginId),
    RetryEnqueue(OriginId),
    GrantArrived(Sequence),
    BodyCleared(Sequence),
    L2Done(Sequence),
    AckArrived(Sequence),
    DataDelivered(OriginId, Option<Sequence>),
    RawL2Locked(OriginId),
}

#[derive(Debug, Clone, Copy)]
struct RetireNotice {
    sequence: Sequence,
    origin: OriginId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub origin: OriginId,
    pub sequence: Option<Sequence>,
    pub at_ns: u64,
}

/// Outcome of one storm run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StormReport {
    pub mode: StormMode,
    pub sm_count: u32,
    pub duration_ns: u64,
    pub grant_order: Vec<Sequence>,
    /// Order in which completions were reported to the ROB.
    pub completion_order: Vec<Sequence>,
    /// Order in which retirement callbacks fired.
    pub retirement_order: Vec<Sequence>,
    pub deliveries: Vec<Delivery>,
    pub stalls: u32,
    pub peak_contention: f64,
    pub grant_count: u64,
    /// Arbiter still held queue or ROB entries when the run ended.
    pub arbiter_active_at_end: bool,
    pub trace: Vec<TraceEvent>,
}

impl StormReport {
    pub fn retired_in_sequence_order(&self) -> bool {
        self.retirement_order.windows(2).all(|w| w[0] < w[1])
    }

    /// `true` if L2 handed results back in a different order than they were issued.
    pub fn completed_out_of_order(&self) -> bool {
        self.completion_order.windows(2).any(|w| w[0] > w[1])
    }
}

pub struct AtomicStorm<P = FifoGrantPolicy> {
    config: StormConfig,
    arbiter: Arbiter,
    policy: P,
    clock: VirtualClock,
    timers: TimerQueue<StormTimer>,
    rng: StdRng,
    grants_in_flight: usize,
    retired_tx: mpsc::Sender<RetireNotice>,
    retired_rx: mpsc::Receiver<RetireNotice>,
    report: StormReport,
}

impl AtomicStorm<FifoGrantPolicy> {
    pub fn new(config: StormConfig) -> Result<Self, ConfigError> {
        Self::with_policy(config, FifoGrantPolicy)
    }
}

impl<P: GrantPolicy> AtomicStorm<P> {
    pub fn with_policy(config: StormConfig, policy: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut arbiter = Arbiter::new(config.arbiter)?;
        if config.mode == StormMode::RawBus {
            arbiter.set_enabled(false);
        }
        let (retired_tx, retired_rx) = mpsc::channel();
        Ok(Self {
            config,
            arbiter,
            policy,
            clock: VirtualClock::new(),
            timers: TimerQueue::new(),
            rng: StdRng::seed_from_u64(config.seed),
            grants_in_flight: 0,
            retired_tx,
            retired_rx,
            report: StormReport {
                mode: config.mode,
                sm_count: config.sm_count,
                duration_ns: 0,
                grant_order: Vec::new(),
                completion_order: Vec::new(),
                retirement_order: Vec::new(),
                deliveries: Vec::new(),
                stalls: 0,
                peak_contention: 0.0,
                grant_count: 0,
                arbiter_active_at_end: false,
                trace: Vec::new(),
            },
        })
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Run until every SM has its DATA back.
    pub fn run(self) -> StormReport {
        self.run_with_observer(&mut NoopObserver)
    }

    pub fn run_with_observer(mut self, observer: &mut dyn StormObserver) -> StormReport {
        info!(
            mode = ?self.config.mode,
            sm_count = self.config.sm_count,
            "atomic storm started"
        );
        self.schedule_launches();

        loop {
            let next = match (self.timers.next_deadline(), self.arbiter.next_deadline()) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => break,
            };
            let now = self.clock.advance_to(next);

            self.arbiter.advance_to(now);
            self.collect_retirements(observer);

            while let Some(due) = self.timers.pop_due(now) {
                self.handle(due.event, observer);
                self.collect_retirements(observer);
            }
            if self.config.mode == StormMode::Arbitrated {
                self.issue_grants(observer);
            }
        }

        self.report.duration_ns = self.clock.now_ns();
        self.report.grant_count = self.arbiter.grant_count();
        self.report.arbiter_active_at_end = self.arbiter.is_active();
        info!(
            duration_ms = apex_time::ns_to_ms_f64(self.report.duration_ns),
            stalls = self.report.stalls,
            grants = self.report.grant_count,
            "atomic storm finished"
        );
        self.report
    }

    fn schedule_launches(&mut self) {
        for idx in 0..self.config.sm_count {
            let origin = OriginId(idx);
            let at = match self.config.mode {
                StormMode::Arbitrated => {
                    u64::from(idx) * self.config.launch_stagger_ns
                        + jitter(&mut self.rng, self.config.launch_jitter_ns)
                }
                StormMode::RawBus => jitter(&mut self.rng, self.config.raw_launch_jitter_ns),
            };
            self.timers.schedule(at, StormTimer::Launch(origin));
        }
    }

    fn handle(&mut self, timer: StormTimer, observer: &mut dyn StormObserver) {
        let now = self.clock.now_ns();
        match timer {
            StormTimer::Launch(origin) => {
                self.emit(observer, TraceKind::Launched { origin });
                match self.config.mode {
                    StormMode::Arbitrated => {
                        self.timers.schedule(
                            now + self.config.travel_to_arbiter_ns,
                            StormTimer::Arrive(origin),
                        );
                    }
                    StormMode::RawBus => {
                        self.timers.schedule(
                            now + self.config.travel_to_arbiter_ns + self.config.to_l2_ns,
                            StormTimer::RawL2Locked(origin),
                        );
                    }
                }
            }
            StormTimer::Arrive(origin) => {
                self.emit(observer, TraceKind::Arrived { origin });
                self.try_enqueue(origin, observer);
            }
            StormTimer::RetryEnqueue(origin) => self.try_enqueue(origin, observer),
            StormTimer::GrantArrived(sequence) => {
                self.arbiter.departed(sequence);
                self.emit(observer, TraceKind::Departed { sequence });
                self.timers.schedule(
                    now + self.config.arbiter_body_ns,
                    StormTimer::BodyCleared(sequence),
                );
            }
            StormTimer::BodyCleared(sequence) => {
                self.grants_in_flight = self.grants_in_flight.saturating_sub(1);
                self.emit(observer, TraceKind::BodyCleared { sequence });
                self.timers
                    .schedule(now + self.config.to_l2_ns, StormTimer::L2Done(sequence));
            }
            StormTimer::L2Done(sequence) => {
                self.arbiter.mark_l2_done(sequence);
                self.emit(observer, TraceKind::L2Complete { sequence });
                let latency = self.l2_latency();
                self.timers.schedule(
                    now + latency + self.config.ack_travel_ns,
                    StormTimer::AckArrived(sequence),
                );
            }
            StormTimer::AckArrived(sequence) => {
                let Some(origin) = self.arbiter.rob().get(sequence).map(|slot| slot.origin())
                else {
                    debug!(%sequence, "stale ack dropped");
                    return;
                };
                self.emit(observer, TraceKind::AckArrived { sequence });
                self.report.completion_order.push(sequence);
                let tx = self.retired_tx.clone();
                self.arbiter.report_completion(
                    sequence,
                    Box::new(move || {
                        let _ = tx.send(RetireNotice { sequence, origin });
                    }),
                );
            }
            StormTimer::RawL2Locked(origin) => {
                self.emit(observer, TraceKind::L2Locked { origin });
                let lock = self.sample(self.config.raw_lock);
                self.timers.schedule(
                    now + lock + self.config.data_travel_ns,
                    StormTimer::DataDelivered(origin, None),
                );
            }
            StormTimer::DataDelivered(origin, sequence) => {
                self.emit(observer, TraceKind::DataDelivered { origin, sequence });
                self.report.deliveries.push(Delivery {
                    origin,
                    sequence,
                    at_ns: now,
                });
            }
        }
    }

    fn try_enqueue(&mut self, origin: OriginId, observer: &mut dyn StormObserver) {
        match self.arbiter.enqueue_request(origin, AtomicKind::Add) {
            Ok(sequence) => {
                self.emit(observer, TraceKind::Admitted { origin, sequence });
                self.report.peak_contention =
                    self.report.peak_contention.max(self.arbiter.contention());
            }
            Err(err) => {
                debug!(%origin, %err, "stalled at bus interface");
                self.report.stalls += 1;
                self.emit(observer, TraceKind::Stalled { origin });
                self.timers.schedule(
                    self.clock.now_ns() + self.config.retry_backoff_ns,
                    StormTimer::RetryEnqueue(origin),
                );
            }
        }
    }

    fn issue_grants(&mut self, observer: &mut dyn StormObserver) {
        while self.grants_in_flight < self.config.max_grants_in_flight {
            let Some(sequence) = self.policy.next_grant(self.arbiter.queue()) else {
                break;
            };
            let Some(origin) = self.arbiter.queue().get(sequence).map(|e| e.origin) else {
                break;
            };
            if !self.arbiter.grant(sequence) {
                break;
            }
            self.grants_in_flight += 1;
            self.report.grant_order.push(sequence);
            self.emit(observer, TraceKind::Granted { origin, sequence });
            self.timers.schedule(
                self.clock.now_ns() + self.config.grant_travel_ns,
                StormTimer::GrantArrived(sequence),
            );
        }
    }

    fn collect_retirements(&mut self, observer: &mut dyn StormObserver) {
        while let Ok(notice) = self.retired_rx.try_recv() {
            self.report.retirement_order.push(notice.sequence);
            self.emit(
                observer,
                TraceKind::Retired {
                    origin: notice.origin,
                    sequence: notice.sequence,
                },
            );
            self.timers.schedule(
                self.clock.now_ns() + self.config.data_travel_ns,
                StormTimer::DataDelivered(notice.origin, Some(notice.sequence)),
            );
        }
    }

    /// Bimodal L2 latency: a fast bank most of the time, a busy bank otherwise.
    fn l2_latency(&mut self) -> u64 {
        let fast = self.rng.gen_bool(self.config.l2_fast_probability);
        let range = if fast {
            self.config.l2_fast
        } else {
            self.config.l2_slow
        };
        self.sample(range)
    }

    fn sample(&mut self, range: NsRange) -> u64 {
        self.rng.gen_range(range.lo..range.hi)
    }

    fn emit(&mut self, observer: &mut dyn StormObserver, kind: TraceKind) {
        let event = TraceEvent {
            at_ns: self.clock.now_ns(),
            kind,
        };
        observer.on_event(&event);
        self.report.trace.push(event);
    }
}

fn jitter(rng: &mut StdRng, max_ns: u64) -> u64 {
    if max_ns == 0 {
        0
    } else {
        rng.gen_range(0..max_ns)
    }
}
