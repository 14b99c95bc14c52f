//! Apex atomic arbiter.
//!
//! Models how concurrent atomic memory operations from many SMs are serialized and retired in
//! order despite completing out of order:
//!
//! - [`SequenceGenerator`] stamps every admitted request with a monotonically increasing
//!   [`Sequence`].
//! - [`AdmissionQueue`] is the bounded, arrival-ordered holding area that applies back-pressure.
//! - [`ReorderBuffer`] tracks each request from admission to retirement and only ever retires its
//!   head.
//! - [`Arbiter`] orchestrates the three and fires each request's retirement callback exactly
//!   once, in ascending sequence order.
//! - [`storm::AtomicStorm`] is the reference orchestration (FIFO grants, one grant in flight)
//!   that drives the arbiter on virtual time.
//!
//! Rendering is out of scope: callers observe the arbiter through return values, callbacks,
//! [`ArbiterSnapshot`] and [`storm::TraceEvent`]s.

mod arbiter;
mod config;
mod error;
mod notify;
mod phase;
mod queue;
mod rob;
mod seq;
mod shared;
mod snapshot;
pub mod storm;
mod types;

pub use arbiter::Arbiter;
pub use config::{ArbiterConfig, QUEUE_CAPACITY, RECENT_GRANTS_LEN};
pub use error::{AdmissionError, ConfigError, InvariantViolation, RetireCanceled};
pub use notify::{OnRetired, RetireTicket};
pub use phase::{ActiveOp, OpPhase, RecentGrant};
pub use queue::{AdmissionQueue, QueueEntry};
pub use rob::{MarkOutcome, ReorderBuffer, RobSlot, RobSlotView, SlotState};
pub use seq::SequenceGenerator;
pub use shared::SharedArbiter;
pub use snapshot::ArbiterSnapshot;
pub use types::{AtomicKind, OriginId, Sequence};
