use thiserror::Error;

use crate::types::Sequence;

/// Why a request was not admitted.
///
/// `QueueFull` is the recoverable "rejected" outcome: the caller is expected to retry after a
/// backoff. Rejection never consumes a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("admission queue full ({capacity} entries)")]
    QueueFull { capacity: usize },

    #[error("atomic arbiter is disabled")]
    Disabled,
}

impl AdmissionError {
    /// `true` for back-pressure rejections that a retry can resolve.
    pub fn is_rejected(self) -> bool {
        matches!(self, AdmissionError::QueueFull { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("queue capacity must be non-zero")]
    ZeroCapacity,

    #[error("invalid storm configuration: {0}")]
    InvalidStorm(&'static str),
}

/// A broken internal invariant. These indicate a defect in the arbiter, never a caller error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("admission queue holds {len} entries (capacity {capacity})")]
    QueueOverCapacity { len: usize, capacity: usize },

    #[error("admission queue out of order: {prev} precedes {next}")]
    QueueOutOfOrder { prev: Sequence, next: Sequence },

    #[error("reorder buffer out of order: {prev} precedes {next}")]
    RobOutOfOrder { prev: Sequence, next: Sequence },

    #[error("queue entry {0} has no reorder buffer slot")]
    OrphanQueueEntry(Sequence),

    #[error("{0} is done but not at the reorder buffer head")]
    DoneBehindHead(Sequence),

    #[error("{0} is done but no removal is scheduled")]
    DoneWithoutRemoval(Sequence),

    #[error("{sequence} was issued but the next sequence is {next}")]
    SequenceFromFuture { sequence: Sequence, next: Sequence },

    #[error("{retired} retired after {previous}")]
    RetiredOutOfOrder { previous: Sequence, retired: Sequence },

    #[error("active flag is {active} but queue={queue_len} rob={rob_len}")]
    ActiveFlagStale {
        active: bool,
        queue_len: usize,
        rob_len: usize,
    },
}

/// Returned by a [`crate::RetireTicket`] whose request was cancelled or reset away before it
/// retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request was dropped before it retired")]
pub struct RetireCanceled;
