#![cfg(not(target_arch = "wasm32"))]

use apex_time::TimerQueue;
use proptest::prelude::*;

proptest! {
    #[test]
    fn pops_are_sorted_by_deadline_then_schedule_order(
        deadlines in proptest::collection::vec(0u64..64, 0..64),
        cancel_mask in proptest::collection::vec(any::<bool>(), 64),
    ) {
        let mut q = TimerQueue::new();
        let mut expected = Vec::new();
        for (idx, &deadline) in deadlines.iter().enumerate() {
            let id = q.schedule(deadline, idx);
            if cancel_mask[idx] {
                prop_assert_eq!(q.cancel(id), Some(idx));
            } else {
                expected.push((deadline, idx));
            }
        }
        expected.sort();

        let mut popped = Vec::new();
        while let Some(t) = q.pop_next() {
            popped.push((t.deadline_ns, t.event));
        }
        prop_assert_eq!(popped, expected);
        prop_assert!(q.is_empty());
    }
}
