use std::collections::BTreeMap;

use tracing::trace;

use super::types::{TouchPoint, TouchSnapshot};

/// One finger reported by the device for a time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub slot: u8,
    pub x: f64,
    pub y: f64,
}

/// Full contact set reported for one time step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawFrame {
    pub t_ms: u64,
    pub contacts: Vec<Contact>,
}

#[derive(Clone, Copy, Debug)]
struct FingerSlot {
    point: TouchPoint,
    last_seen_ms: u64,
    /// Missing from the most recent frame, held within the dropout tolerance.
    stale: bool,
}

/// Turns raw frames into ordered multi-finger snapshots.
///
/// A finger missing from a frame is kept at its last position for
/// `dropout_tolerance_ms`, so a single dropped report does not look like a
/// finger-count change. Stale fingers never push the count above what was
/// tracked before the dropout.
pub struct FingerTracker {
    slots: BTreeMap<u8, FingerSlot>,
    dropout_tolerance_ms: u64,
    last_t_ms: u64,
}

impl FingerTracker {
    pub fn new(dropout_tolerance_ms: u64) -> Self {
        Self {
            slots: BTreeMap::new(),
            dropout_tolerance_ms,
            last_t_ms: 0,
        }
    }

    pub fn finger_count(&self) -> u8 {
        self.slots.len().min(u8::MAX as usize) as u8
    }

    pub fn ingest(&mut self, frame: &RawFrame) -> TouchSnapshot {
        // Device clocks can step backwards across reconnects; keep time monotonic.
        let now_ms = frame.t_ms.max(self.last_t_ms);
        self.last_t_ms = now_ms;

        let tracked_before = self.slots.len();
        let mut seen: BTreeMap<u8, FingerSlot> = BTreeMap::new();
        for contact in &frame.contacts {
            seen.insert(
                contact.slot,
                FingerSlot {
                    point: TouchPoint::new(contact.x, contact.y),
                    last_seen_ms: now_ms,
                    stale: false,
                },
            );
        }

        let mut stale_budget = tracked_before.saturating_sub(seen.len());
        let tolerance = self.dropout_tolerance_ms;
        for (slot, finger) in &self.slots {
            if stale_budget == 0 {
                break;
            }
            if seen.contains_key(slot) {
                continue;
            }
            if now_ms.saturating_sub(finger.last_seen_ms) <= tolerance && tolerance > 0 {
                trace!(slot, "tracker: holding dropped finger");
                seen.insert(
                    *slot,
                    FingerSlot {
                        stale: true,
                        ..*finger
                    },
                );
                stale_budget -= 1;
            }
        }

        self.slots = seen;
        self.snapshot(now_ms)
    }

    /// Drop held fingers whose dropout tolerance has run out without a new
    /// frame. Fingers present in the latest frame stay until a frame says
    /// otherwise. Returns a snapshot only when the finger set changed.
    pub fn expire(&mut self, now_ms: u64) -> Option<TouchSnapshot> {
        let now_ms = now_ms.max(self.last_t_ms);
        let before = self.slots.len();
        let tolerance = self.dropout_tolerance_ms;
        self.slots.retain(|_, finger| {
            !finger.stale || now_ms.saturating_sub(finger.last_seen_ms) <= tolerance
        });
        if self.slots.len() == before {
            return None;
        }
        self.last_t_ms = now_ms;
        Some(self.snapshot(now_ms))
    }

    /// Earliest time at which [`expire`](Self::expire) would drop a stale finger.
    pub fn next_expiry_ms(&self) -> Option<u64> {
        self.slots
            .values()
            .filter(|finger| finger.stale)
            .map(|finger| {
                finger
                    .last_seen_ms
                    .saturating_add(self.dropout_tolerance_ms)
                    .saturating_add(1)
            })
            .min()
    }

    /// Forget every finger, e.g. after the source disconnected.
    pub fn reset(&mut self, now_ms: u64) -> TouchSnapshot {
        self.slots.clear();
        self.last_t_ms = now_ms.max(self.last_t_ms);
        TouchSnapshot::released(self.last_t_ms)
    }

    fn snapshot(&self, t_ms: u64) -> TouchSnapshot {
        TouchSnapshot::from_slots(t_ms, self.slots.iter().map(|(slot, f)| (*slot, f.point)))
    }
}

#[cfg(test)]
mod tests;
