use crate::queue::AdmissionQueue;
use crate::types::Sequence;

/// Decides which queued request gets the next grant.
///
/// The ROB enforces in-order retirement no matter what a policy picks, so alternative
/// orderings are valid; they only change how long completed results wait at the ROB.
pub trait GrantPolicy {
    fn next_grant(&mut self, queue: &AdmissionQueue) -> Option<Sequence>;
}

/// Always grant the lowest ungranted sequence, so grant order equals sequence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoGrantPolicy;

impl GrantPolicy for FifoGrantPolicy {
    fn next_grant(&mut self, queue: &AdmissionQueue) -> Option<Sequence> {
        queue.oldest_ungranted()
    }
}

impl<P: GrantPolicy + ?Sized> GrantPolicy for Box<P> {
    fn next_grant(&mut self, queue: &AdmissionQueue) -> Option<Sequence> {
        (**self).next_grant(queue)
    }
}
