//! Binding table and resolution.

use crate::gesture::types::{Direction, GestureDescriptor, GestureKind};

/// A configured rule mapping a gesture description to command templates.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub kind: GestureKind,
    pub direction: Direction,
    pub fingers: u8,
    pub on_start: Option<String>,
    pub on_update: Option<String>,
    pub on_end: Option<String>,
    pub mouse_up_delay_ms: Option<u64>,
    pub acceleration: Option<f64>,
}

impl Binding {
    /// `Any` on the binding side is a wildcard; an ambiguous (`Any`) gesture
    /// only matches `Any` bindings.
    pub fn matches(&self, descriptor: &GestureDescriptor) -> bool {
        self.kind == descriptor.kind
            && self.fingers == descriptor.fingers
            && (self.direction == Direction::Any || self.direction == descriptor.direction)
    }

    pub fn drags_pointer(&self) -> bool {
        self.acceleration.is_some()
    }
}

/// Kinds that have at least one binding for a given finger count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindSet {
    pub swipe: bool,
    pub pinch: bool,
    pub hold: bool,
}

impl KindSet {
    pub fn all() -> Self {
        Self {
            swipe: true,
            pinch: true,
            hold: true,
        }
    }

    pub fn insert(&mut self, kind: GestureKind) {
        match kind {
            GestureKind::Swipe => self.swipe = true,
            GestureKind::Pinch => self.pinch = true,
            GestureKind::Hold => self.hold = true,
            GestureKind::Unknown => {}
        }
    }

    pub fn contains(&self, kind: GestureKind) -> bool {
        match kind {
            GestureKind::Swipe => self.swipe,
            GestureKind::Pinch => self.pinch,
            GestureKind::Hold => self.hold,
            GestureKind::Unknown => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.swipe || self.pinch || self.hold)
    }
}

/// Immutable, declaration-ordered binding list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl BindingTable {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// First-declared matching binding, with its index.
    pub fn resolve(&self, descriptor: &GestureDescriptor) -> Option<(usize, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .find(|(_, binding)| binding.matches(descriptor))
    }

    pub fn kinds_for_fingers(&self, fingers: u8) -> KindSet {
        let mut kinds = KindSet::default();
        for binding in self.bindings.iter().filter(|b| b.fingers == fingers) {
            kinds.insert(binding.kind);
        }
        kinds
    }

    pub fn tracks_fingers(&self, fingers: u8) -> bool {
        fingers > 0 && self.bindings.iter().any(|b| b.fingers == fingers)
    }
}

#[cfg(test)]
mod tests;
