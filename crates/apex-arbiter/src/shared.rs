//! Thread-safe handle around [`Arbiter`].
//!
//! Every mutating operation takes the same mutex, which serializes the ordered containers and
//! counters the invariants depend on. Retirement callbacks run while the lock is held, so they
//! must not call back into the same handle.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::arbiter::Arbiter;
use crate::config::ArbiterConfig;
use crate::error::{AdmissionError, ConfigError};
use crate::notify::{OnRetired, RetireTicket};
use crate::snapshot::ArbiterSnapshot;
use crate::types::{AtomicKind, OriginId, Sequence};

#[derive(Debug, Clone, Default)]
pub struct SharedArbiter {
    inner: Arc<Mutex<Arbiter>>,
}

impl SharedArbiter {
    pub fn new(config: ArbiterConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_arbiter(Arbiter::new(config)?))
    }

    pub fn from_arbiter(arbiter: Arbiter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(arbiter)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arbiter> {
        // A panic inside a retirement callback poisons the mutex but leaves the arbiter itself
        // consistent: the retired slot is removed or has its removal scheduled before the
        // callback runs.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the arbiter.
    pub fn with<R>(&self, f: impl FnOnce(&mut Arbiter) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn enqueue_request(
        &self,
        origin: OriginId,
        kind: AtomicKind,
    ) -> Result<Sequence, AdmissionError> {
        self.lock().enqueue_request(origin, kind)
    }

    pub fn grant(&self, sequence: Sequence) -> bool {
        self.lock().grant(sequence)
    }

    pub fn departed(&self, sequence: Sequence) -> bool {
        self.lock().departed(sequence)
    }

    pub fn report_completion(&self, sequence: Sequence, on_retired: OnRetired) {
        self.lock().report_completion(sequence, on_retired);
    }

    pub fn report_completion_future(&self, sequence: Sequence) -> RetireTicket {
        self.lock().report_completion_future(sequence)
    }

    pub fn cancel(&self, sequence: Sequence) -> bool {
        self.lock().cancel(sequence)
    }

    pub fn advance_to(&self, now_ns: u64) {
        self.lock().advance_to(now_ns);
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    pub fn contention(&self) -> f64 {
        self.lock().contention()
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        self.lock().snapshot()
    }
}
