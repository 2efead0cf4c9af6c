use super::*;

fn swipe(direction: Direction, fingers: u8, end: &str) -> Binding {
    Binding {
        kind: GestureKind::Swipe,
        direction,
        fingers,
        on_start: None,
        on_update: None,
        on_end: Some(end.to_string()),
        mouse_up_delay_ms: None,
        acceleration: None,
    }
}

fn descriptor(kind: GestureKind, direction: Direction, fingers: u8) -> GestureDescriptor {
    GestureDescriptor {
        kind,
        direction,
        fingers,
    }
}

#[test]
fn first_declared_binding_wins_ties() {
    let table = BindingTable::new(vec![
        swipe(Direction::Any, 3, "first"),
        swipe(Direction::Any, 3, "second"),
    ]);
    let gesture = descriptor(GestureKind::Swipe, Direction::E, 3);

    for _ in 0..16 {
        let (index, binding) = table.resolve(&gesture).expect("binding should match");
        assert_eq!(index, 0);
        assert_eq!(binding.on_end.as_deref(), Some("first"));
    }
}

#[test]
fn exact_direction_declared_later_does_not_override_any() {
    let table = BindingTable::new(vec![
        swipe(Direction::Any, 3, "any"),
        swipe(Direction::E, 3, "east"),
    ]);
    let (index, _) = table
        .resolve(&descriptor(GestureKind::Swipe, Direction::E, 3))
        .expect("binding should match");
    assert_eq!(index, 0);
}

#[test]
fn ambiguous_gesture_only_matches_any_bindings() {
    let table = BindingTable::new(vec![
        swipe(Direction::W, 4, "west"),
        swipe(Direction::Any, 4, "any"),
    ]);
    let (index, _) = table
        .resolve(&descriptor(GestureKind::Swipe, Direction::Any, 4))
        .expect("any binding should match");
    assert_eq!(index, 1);

    let strict = BindingTable::new(vec![swipe(Direction::W, 4, "west")]);
    assert!(strict
        .resolve(&descriptor(GestureKind::Swipe, Direction::Any, 4))
        .is_none());
}

#[test]
fn fingers_and_kind_must_match_exactly() {
    let table = BindingTable::new(vec![swipe(Direction::Any, 3, "three")]);
    assert!(table
        .resolve(&descriptor(GestureKind::Swipe, Direction::N, 4))
        .is_none());
    assert!(table
        .resolve(&descriptor(GestureKind::Pinch, Direction::In, 3))
        .is_none());
    assert!(table.resolve(&descriptor(GestureKind::Swipe, Direction::N, 3)).is_some());
}

#[test]
fn kinds_for_fingers_collects_bound_kinds() {
    let mut hold = swipe(Direction::Any, 4, "hold");
    hold.kind = GestureKind::Hold;
    let table = BindingTable::new(vec![swipe(Direction::Any, 3, "a"), hold]);

    let three = table.kinds_for_fingers(3);
    assert!(three.contains(GestureKind::Swipe));
    assert!(!three.contains(GestureKind::Hold));

    let four = table.kinds_for_fingers(4);
    assert!(four.contains(GestureKind::Hold));
    assert!(!four.contains(GestureKind::Swipe));

    assert!(table.kinds_for_fingers(2).is_empty());
    assert!(table.tracks_fingers(3));
    assert!(!table.tracks_fingers(0));
    assert!(!table.tracks_fingers(5));
}
