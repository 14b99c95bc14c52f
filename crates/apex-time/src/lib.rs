//! Virtual time and timer scheduling primitives.
//!
//! The arbiter and its scenario driver use **virtual time** (monotonic nanoseconds since reset) as
//! the single source of truth for every delay they model: ROB settle windows, signal travel, L2
//! latency and retry backoff. Nothing here reads a host clock, so tests can drive the system
//! deterministically by advancing time explicitly.

mod clock;
mod timer_queue;

pub use clock::VirtualClock;
pub use timer_queue::{TimerEvent, TimerId, TimerQueue};

pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Convert whole milliseconds to virtual nanoseconds, saturating on overflow.
pub const fn ms(millis: u64) -> u64 {
    millis.saturating_mul(NANOS_PER_MILLI)
}

/// Convert virtual nanoseconds to (fractional) milliseconds for display.
pub fn ns_to_ms_f64(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_MILLI as f64
}
