use super::*;
use crate::gesture::types::TouchPoint;

fn snapshot(t_ms: u64, points: &[(f64, f64)]) -> TouchSnapshot {
    TouchSnapshot::new(
        t_ms,
        points.iter().map(|&(x, y)| TouchPoint::new(x, y)).collect(),
    )
}

fn shifted(points: &[(f64, f64)], dx: f64, dy: f64) -> Vec<(f64, f64)> {
    points.iter().map(|&(x, y)| (x + dx, y + dy)).collect()
}

const THREE: [(f64, f64); 3] = [(400.0, 300.0), (450.0, 300.0), (500.0, 300.0)];

fn oblique() -> f64 {
    EngineTuning::default().oblique_ratio
}

#[test]
fn quantize_matches_compass_examples() {
    assert_eq!(quantize_direction(100.0, 0.0, oblique()), Direction::E);
    assert_eq!(quantize_direction(0.0, -100.0, oblique()), Direction::N);
    assert_eq!(quantize_direction(70.0, -70.0, oblique()), Direction::NE);
    assert_eq!(quantize_direction(-70.0, 70.0, oblique()), Direction::SW);
    assert_eq!(quantize_direction(-100.0, -10.0, oblique()), Direction::W);
    assert_eq!(quantize_direction(-60.0, -70.0, oblique()), Direction::NW);
    assert_eq!(quantize_direction(10.0, 90.0, oblique()), Direction::S);
    assert_eq!(quantize_direction(80.0, 60.0, oblique()), Direction::SE);
    assert_eq!(quantize_direction(0.0, 0.0, oblique()), Direction::Any);
}

#[test]
fn quantize_sectors_are_45_degrees_wide() {
    let expected = [
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
        Direction::N,
        Direction::NE,
    ];
    for (bucket, direction) in expected.iter().enumerate() {
        let center = bucket as f64 * 45.0;
        for offset in [-20.0, -10.0, 0.0, 10.0, 20.0] {
            let angle = (center + offset).to_radians();
            let got = quantize_direction(100.0 * angle.cos(), 100.0 * angle.sin(), oblique());
            assert_eq!(got, *direction, "angle {}", center + offset);
        }
    }
}

#[test]
fn translation_beyond_threshold_classifies_swipe_for_any_angle() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &THREE);
    for step in 0..16 {
        let angle = (step as f64 * 22.5 + 5.0).to_radians();
        let (dx, dy) = (80.0 * angle.cos(), 80.0 * angle.sin());
        let current = snapshot(40, &shifted(&THREE, dx, dy));
        let features = motion_features(&origin, &current).expect("comparable snapshots");
        assert_eq!(
            classify(&features, 3, 40, KindSet::all(), &tuning),
            Classification::Decided {
                kind: GestureKind::Swipe,
                direction: quantize_direction(dx, dy, tuning.oblique_ratio),
            }
        );
    }
}

#[test]
fn spreading_fingers_classify_pinch_out() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &[(400.0, 300.0), (500.0, 300.0)]);
    let current = snapshot(50, &[(370.0, 300.0), (530.0, 300.0)]);
    let features = motion_features(&origin, &current).expect("comparable snapshots");
    assert!((features.spread_ratio - 1.6).abs() < 1e-9);
    assert_eq!(features.translation(), 0.0);
    assert_eq!(
        classify(&features, 2, 50, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Pinch,
            direction: Direction::Out,
        }
    );
}

#[test]
fn closing_fingers_classify_pinch_in() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &[(300.0, 300.0), (500.0, 300.0), (400.0, 450.0)]);
    let current = snapshot(50, &[(340.0, 320.0), (460.0, 320.0), (400.0, 410.0)]);
    let features = motion_features(&origin, &current).expect("comparable snapshots");
    assert!(features.spread_ratio < 1.0);
    assert_eq!(
        classify(&features, 3, 50, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Pinch,
            direction: Direction::In,
        }
    );
}

#[test]
fn rotation_without_spread_change_classifies_clockwise() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &[(400.0, 300.0), (500.0, 300.0)]);
    // Rotate 30 degrees around (450, 300); y grows downward so this is clockwise.
    let angle = 30f64.to_radians();
    let (c, s) = (angle.cos() * 50.0, angle.sin() * 50.0);
    let current = snapshot(50, &[(450.0 - c, 300.0 - s), (450.0 + c, 300.0 + s)]);
    let features = motion_features(&origin, &current).expect("comparable snapshots");
    assert!((features.rotation_deg - 30.0).abs() < 1e-6);
    assert_eq!(
        classify(&features, 2, 50, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Pinch,
            direction: Direction::Clockwise,
        }
    );
}

#[test]
fn stationary_fingers_become_hold_only_when_bound() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &THREE);
    let current = snapshot(tuning.hold_ms, &shifted(&THREE, 1.0, -1.0));
    let features = motion_features(&origin, &current).expect("comparable snapshots");

    assert_eq!(
        classify(&features, 3, tuning.hold_ms, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Hold,
            direction: Direction::Any,
        }
    );

    let swipe_only = KindSet {
        swipe: true,
        ..KindSet::default()
    };
    assert_eq!(
        classify(&features, 3, tuning.hold_ms, swipe_only, &tuning),
        Classification::Decided {
            kind: GestureKind::Swipe,
            direction: Direction::Any,
        }
    );

    // Resting toward a bound hold is not ambiguous; the window does not apply.
    assert!(tuning.hold_ms - 1 > tuning.classify_window_ms);
    assert_eq!(
        classify(&features, 3, tuning.hold_ms - 1, KindSet::all(), &tuning),
        Classification::Pending
    );
}

#[test]
fn ambiguous_candidate_defaults_to_any_swipe_after_window() {
    let tuning = EngineTuning::default();
    let origin = snapshot(0, &THREE);
    // Too much drift for a hold, too little for a swipe.
    let current = snapshot(100, &shifted(&THREE, 12.0, 0.0));
    let features = motion_features(&origin, &current).expect("comparable snapshots");

    assert_eq!(
        classify(&features, 3, 100, KindSet::all(), &tuning),
        Classification::Pending
    );
    assert_eq!(
        classify(&features, 3, tuning.classify_window_ms, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Swipe,
            direction: Direction::Any,
        }
    );
}

#[test]
fn mismatched_finger_counts_are_not_comparable() {
    let origin = snapshot(0, &THREE);
    let current = snapshot(10, &THREE[..2]);
    assert!(motion_features(&origin, &current).is_none());

    let mut malformed = snapshot(10, &THREE);
    malformed.positions[1].x = f64::NAN;
    assert!(motion_features(&origin, &malformed).is_none());
}

#[test]
fn accumulate_carries_previous_segments() {
    let carried = GestureMotion::Swipe {
        delta_x: 50.0,
        delta_y: 0.0,
    };
    let segment = MotionFeatures {
        dx: 20.0,
        dy: -5.0,
        ..MotionFeatures::default()
    };
    assert_eq!(
        accumulate(&carried, &segment),
        GestureMotion::Swipe {
            delta_x: 70.0,
            delta_y: -5.0,
        }
    );

    let pinch = GestureMotion::Pinch {
        scale: 1.5,
        delta_angle: 10.0,
    };
    let segment = MotionFeatures {
        spread_ratio: 2.0,
        rotation_deg: 5.0,
        ..MotionFeatures::default()
    };
    assert_eq!(
        accumulate(&pinch, &segment),
        GestureMotion::Pinch {
            scale: 3.0,
            delta_angle: 15.0,
        }
    );
}

#[test]
fn jitter_near_centroid_does_not_turn_swipe_into_rotation() {
    let tuning = EngineTuning::default();
    // Middle finger drifts 4 units across the centroid line while the row
    // moves 40 units right.
    let origin = snapshot(0, &[(100.0, 100.0), (150.0, 102.0), (200.0, 100.0)]);
    let current = snapshot(40, &[(140.0, 100.0), (190.0, 98.0), (240.0, 100.0)]);
    let features = motion_features(&origin, &current).expect("comparable snapshots");

    assert!(features.rotation_deg.abs() < 1.0, "{features:?}");
    assert_eq!(
        classify(&features, 3, 40, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Swipe,
            direction: Direction::E,
        }
    );
}

#[test]
fn rotation_holds_up_with_a_centre_finger() {
    let tuning = EngineTuning::default();
    let angle = 30f64.to_radians();
    let (c, s) = (angle.cos() * 50.0, angle.sin() * 50.0);
    let origin = snapshot(0, &[(400.0, 300.0), (450.0, 301.0), (500.0, 300.0)]);
    let current = snapshot(50, &[(450.0 - c, 300.0 - s), (450.0, 299.0), (450.0 + c, 300.0 + s)]);
    let features = motion_features(&origin, &current).expect("comparable snapshots");

    assert!((features.rotation_deg - 30.0).abs() < 2.0, "{features:?}");
    assert_eq!(
        classify(&features, 3, 50, KindSet::all(), &tuning),
        Classification::Decided {
            kind: GestureKind::Pinch,
            direction: Direction::Clockwise,
        }
    );
}

#[test]
fn fingers_are_paired_by_slot() {
    let origin = snapshot(0, &[(100.0, 100.0), (150.0, 100.0), (200.0, 100.0)]);
    // Slot 1 lifted and slot 5 landed elsewhere in the same frame.
    let current = TouchSnapshot::from_slots(
        20,
        [
            (0, TouchPoint::new(100.0, 100.0)),
            (2, TouchPoint::new(200.0, 100.0)),
            (5, TouchPoint::new(150.0, 300.0)),
        ],
    );
    let features = motion_features(&origin, &current).expect("two slots in common");
    assert_eq!(features.translation(), 0.0);
    assert_eq!(features.spread_ratio, 1.0);
    assert_eq!(features.rotation_deg, 0.0);

    let strangers = TouchSnapshot::from_slots(
        20,
        [
            (7, TouchPoint::new(100.0, 100.0)),
            (8, TouchPoint::new(150.0, 100.0)),
            (9, TouchPoint::new(200.0, 100.0)),
        ],
    );
    assert!(motion_features(&origin, &strangers).is_none());
}
