#![cfg(not(target_arch = "wasm32"))]

use apex_arbiter::{
    AdmissionError, Arbiter, ArbiterConfig, AtomicKind, OriginId, Sequence, QUEUE_CAPACITY,
};

fn admit(arb: &mut Arbiter, origin: u32) -> Sequence {
    arb.enqueue_request(OriginId(origin), AtomicKind::Add)
        .expect("admission should succeed")
}

#[test]
fn sequences_are_strictly_increasing_until_reset() {
    let mut arb = Arbiter::default();
    let mut last = None;
    for i in 0..QUEUE_CAPACITY as u32 {
        let seq = admit(&mut arb, i);
        if let Some(prev) = last {
            assert!(seq > prev);
        }
        last = Some(seq);
    }
    assert_eq!(last, Some(Sequence(5)));

    arb.reset();
    assert_eq!(admit(&mut arb, 0), Sequence(0));
}

#[test]
fn full_queue_rejects_without_consuming_a_sequence() {
    let mut arb = Arbiter::default();
    for i in 0..6 {
        assert_eq!(admit(&mut arb, i), Sequence(i as u64));
    }
    assert!(arb.is_full());

    for _ in 0..3 {
        let err = arb
            .enqueue_request(OriginId(9), AtomicKind::Cas)
            .unwrap_err();
        assert_eq!(err, AdmissionError::QueueFull { capacity: 6 });
        assert!(err.is_rejected());
    }
    assert_eq!(arb.next_sequence(), Sequence(6));
    assert_eq!(arb.queue().len(), 6);
    assert_eq!(arb.rob().len(), 6);
}

#[test]
fn granted_but_not_departed_still_occupies_a_slot() {
    let mut arb = Arbiter::default();
    for i in 0..6 {
        admit(&mut arb, i);
    }
    assert!(arb.grant(Sequence(0)));
    assert!(arb.is_full());
    assert!(arb
        .enqueue_request(OriginId(6), AtomicKind::Add)
        .is_err());

    assert!(arb.departed(Sequence(0)));
    assert!(!arb.is_full());
}

#[test]
fn seventh_admission_succeeds_after_first_departure() {
    let mut arb = Arbiter::default();
    for i in 0..6 {
        admit(&mut arb, i);
    }
    assert!(matches!(
        arb.enqueue_request(OriginId(6), AtomicKind::Add),
        Err(AdmissionError::QueueFull { .. })
    ));

    arb.grant(Sequence(0));
    assert!(arb.departed(Sequence(0)));

    assert_eq!(admit(&mut arb, 6), Sequence(6));
    assert_eq!(arb.queue().len(), 6);
    // Seq 0 is in flight: it left the queue but still holds its ROB slot.
    assert_eq!(arb.rob().len(), 7);
    arb.check_invariants().unwrap();
}

#[test]
fn departed_does_not_require_a_prior_grant() {
    let mut arb = Arbiter::default();
    admit(&mut arb, 0);
    assert!(arb.departed(Sequence(0)));
    assert!(arb.queue().is_empty());
    assert_eq!(arb.rob().len(), 1);
    assert!(arb.is_active());
}

#[test]
fn departed_but_unretired_requests_never_block_admission() {
    let mut arb = Arbiter::default();
    // Three full queues' worth of requests leave the queue but never complete.
    for i in 0..18 {
        let seq = admit(&mut arb, i);
        assert_eq!(seq, Sequence(i as u64));
        assert!(arb.grant(seq));
        assert!(arb.departed(seq));
        assert!(!arb.is_full());
    }
    assert!(arb.queue().is_empty());
    assert_eq!(arb.rob().len(), 18);

    // Only the queue applies back-pressure.
    for i in 18..24 {
        admit(&mut arb, i);
    }
    assert_eq!(
        arb.enqueue_request(OriginId(24), AtomicKind::Add),
        Err(AdmissionError::QueueFull { capacity: 6 })
    );
    assert_eq!(arb.rob().len(), 24);
    arb.check_invariants().unwrap();
}

#[test]
fn stale_grant_and_departure_are_silent_no_ops() {
    let mut arb = Arbiter::default();
    admit(&mut arb, 0);
    let before = arb.snapshot();

    assert!(!arb.grant(Sequence(42)));
    assert!(!arb.departed(Sequence(42)));
    assert_eq!(arb.snapshot(), before);

    arb.grant(Sequence(0));
    arb.departed(Sequence(0));
    assert!(!arb.grant(Sequence(0)));
    assert!(!arb.departed(Sequence(0)));
    assert_eq!(arb.grant_count(), 1);
}

#[test]
fn contention_tracks_queue_fill() {
    let mut arb = Arbiter::default();
    assert_eq!(arb.contention(), 0.0);
    for i in 0..3 {
        admit(&mut arb, i);
    }
    assert!((arb.contention() - 0.5).abs() < 1e-9);
    for i in 3..6 {
        admit(&mut arb, i);
    }
    assert_eq!(arb.contention(), 1.0);
}

#[test]
fn disabled_arbiter_refuses_admission() {
    let mut arb = Arbiter::new(ArbiterConfig {
        enabled: false,
        ..ArbiterConfig::default()
    })
    .unwrap();
    assert_eq!(
        arb.enqueue_request(OriginId(0), AtomicKind::Add),
        Err(AdmissionError::Disabled)
    );
    assert!(!AdmissionError::Disabled.is_rejected());
    assert!(!arb.is_active());
}

#[test]
fn grants_record_recent_history_newest_first() {
    let mut arb = Arbiter::default();
    for i in 0..6 {
        admit(&mut arb, i);
    }
    for i in 0..6 {
        assert!(arb.grant(Sequence(i)));
    }
    let recent: Vec<_> = arb.recent_grants().iter().map(|g| g.sequence).collect();
    assert_eq!(
        recent,
        vec![Sequence(5), Sequence(4), Sequence(3), Sequence(2)]
    );
    // Six queued entries at grant time: 2 + 6 * 8 + [0, 6).
    assert!(arb
        .recent_grants()
        .iter()
        .all(|g| (50..=56).contains(&g.cycles)));
    assert_eq!(arb.grant_count(), 6);
}

#[test]
fn invalid_config_is_rejected() {
    assert!(Arbiter::new(ArbiterConfig::with_capacity(0)).is_err());
}
