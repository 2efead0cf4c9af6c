use super::*;

fn frame(t_ms: u64, contacts: &[(u8, f64, f64)]) -> RawFrame {
    RawFrame {
        t_ms,
        contacts: contacts
            .iter()
            .map(|&(slot, x, y)| Contact { slot, x, y })
            .collect(),
    }
}

#[test]
fn positions_are_ordered_by_slot() {
    let mut tracker = FingerTracker::new(24);
    let snapshot = tracker.ingest(&frame(10, &[(2, 30.0, 0.0), (0, 10.0, 0.0), (1, 20.0, 0.0)]));

    assert_eq!(snapshot.finger_count, 3);
    assert_eq!(snapshot.t_ms, 10);
    let xs: Vec<f64> = snapshot.positions.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![10.0, 20.0, 30.0]);
    assert_eq!(snapshot.slots, vec![0, 1, 2]);
}

#[test]
fn swapped_finger_keeps_its_own_slot() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0), (2, 90.0, 10.0)]));

    // Slot 1 lifts while slot 5 lands in the same frame.
    let swapped = tracker.ingest(&frame(10, &[(0, 10.0, 10.0), (2, 90.0, 10.0), (5, 50.0, 80.0)]));
    assert_eq!(swapped.finger_count, 3);
    assert_eq!(swapped.slots, vec![0, 2, 5]);
    assert_eq!(swapped.position_of(5), Some(TouchPoint::new(50.0, 80.0)));
    assert_eq!(swapped.position_of(1), None);
}

#[test]
fn brief_dropout_keeps_finger_count() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0), (2, 90.0, 10.0)]));

    let held = tracker.ingest(&frame(12, &[(0, 12.0, 10.0), (2, 92.0, 10.0)]));
    assert_eq!(held.finger_count, 3);
    assert_eq!(held.positions[1], TouchPoint::new(50.0, 10.0));

    let back = tracker.ingest(&frame(20, &[(0, 14.0, 10.0), (1, 54.0, 10.0), (2, 94.0, 10.0)]));
    assert_eq!(back.finger_count, 3);
    assert_eq!(back.positions[1], TouchPoint::new(54.0, 10.0));
}

#[test]
fn dropout_longer_than_tolerance_lowers_count() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0)]));
    assert_eq!(tracker.ingest(&frame(10, &[(0, 10.0, 10.0)])).finger_count, 2);
    assert_eq!(tracker.ingest(&frame(30, &[(0, 10.0, 10.0)])).finger_count, 1);
}

#[test]
fn release_frame_is_held_then_expires_without_new_frames() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0)]));

    let lifted = tracker.ingest(&frame(8, &[]));
    assert_eq!(lifted.finger_count, 2);
    assert_eq!(tracker.next_expiry_ms(), Some(25));

    assert!(tracker.expire(20).is_none());
    let released = tracker.expire(25).expect("stale fingers should expire");
    assert!(released.is_released());
    assert_eq!(released.t_ms, 25);
    assert_eq!(tracker.next_expiry_ms(), None);
}

#[test]
fn present_fingers_never_expire_between_frames() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0)]));
    assert!(tracker.expire(10_000).is_none());
    assert_eq!(tracker.finger_count(), 1);
    assert_eq!(tracker.next_expiry_ms(), None);
}

#[test]
fn zero_tolerance_reports_every_change() {
    let mut tracker = FingerTracker::new(0);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0)]));
    assert!(tracker.ingest(&frame(1, &[])).is_released());
}

#[test]
fn stale_fingers_do_not_inflate_count_when_slot_changes() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(0, &[(0, 10.0, 10.0), (1, 50.0, 10.0)]));
    // Finger 1 is re-reported under a new slot.
    let snapshot = tracker.ingest(&frame(8, &[(0, 10.0, 10.0), (3, 52.0, 10.0)]));
    assert_eq!(snapshot.finger_count, 2);
}

#[test]
fn timestamps_never_go_backwards_and_reset_clears() {
    let mut tracker = FingerTracker::new(24);
    tracker.ingest(&frame(100, &[(0, 10.0, 10.0)]));
    let snapshot = tracker.ingest(&frame(90, &[(0, 11.0, 10.0)]));
    assert_eq!(snapshot.t_ms, 100);

    let reset = tracker.reset(120);
    assert!(reset.is_released());
    assert_eq!(reset.t_ms, 120);
    assert_eq!(tracker.finger_count(), 0);
}
