use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::BindingTable;
use crate::config::EngineTuning;
use crate::gesture::engine::{EngineOutput, GestureEngine};
use crate::gesture::tracker::{FingerTracker, RawFrame};
use crate::gesture::types::{CancelReason, LifecycleEvent, LifecyclePhase};

/// Upper bound on timer steps taken by one [`Recognizer::advance_to`] call.
const MAX_TIMER_STEPS: usize = 64;

/// Finger tracker plus lifecycle engine, driven by one thread.
pub struct Recognizer {
    tracker: FingerTracker,
    engine: GestureEngine,
    frames: u64,
    gestures: u64,
}

impl Recognizer {
    pub fn new(bindings: Arc<BindingTable>, tuning: &EngineTuning) -> Self {
        Self {
            tracker: FingerTracker::new(tuning.dropout_tolerance_ms),
            engine: GestureEngine::new(bindings, tuning.clone()),
            frames: 0,
            gestures: 0,
        }
    }

    pub fn engine(&self) -> &GestureEngine {
        &self.engine
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn gestures(&self) -> u64 {
        self.gestures
    }

    /// Deadlines that fall before the frame's timestamp fire first, so the
    /// result does not depend on how promptly frames were delivered.
    pub fn on_frame(&mut self, frame: &RawFrame) -> Vec<LifecycleEvent> {
        self.frames += 1;
        let mut events = self.advance_to(frame.t_ms.saturating_sub(1));
        let snapshot = self.tracker.ingest(frame);
        trace!(t_ms = snapshot.t_ms, fingers = snapshot.finger_count, "recognizer: snapshot");
        let output = self.engine.handle_snapshot(&snapshot);
        events.extend(self.collect(output));
        events
    }

    /// Let time pass without a frame: stale fingers expire first, then the
    /// engine sees the timer.
    pub fn on_timer(&mut self, now_ms: u64) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        if let Some(snapshot) = self.tracker.expire(now_ms) {
            let output = self.engine.handle_snapshot(&snapshot);
            events.extend(self.collect(output));
        }
        let output = self.engine.handle_timer(now_ms);
        events.extend(self.collect(output));
        events
    }

    /// The source failed: every finger counts as lifted and any gesture goes
    /// through its cancelled end.
    pub fn on_source_lost(&mut self, t_ms: u64) -> Vec<LifecycleEvent> {
        debug!(t_ms, "recognizer: source lost");
        self.cancel(t_ms, CancelReason::SourceLost)
    }

    pub fn shutdown(&mut self, t_ms: u64) -> Vec<LifecycleEvent> {
        self.cancel(t_ms, CancelReason::Shutdown)
    }

    /// Drop all fingers and cancel whatever gesture is live.
    pub fn cancel(&mut self, t_ms: u64, reason: CancelReason) -> Vec<LifecycleEvent> {
        self.tracker.reset(t_ms);
        let output = self.engine.cancel(t_ms, reason);
        self.collect(output)
    }

    pub fn next_deadline_ms(&self) -> Option<u64> {
        match (self.engine.next_deadline_ms(), self.tracker.next_expiry_ms()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every deadline up to and including `t_ms`, in order. Used when
    /// time is virtual, e.g. while replaying a trace.
    pub fn advance_to(&mut self, t_ms: u64) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for _ in 0..MAX_TIMER_STEPS {
            match self.next_deadline_ms() {
                Some(deadline) if deadline <= t_ms => events.extend(self.on_timer(deadline)),
                _ => break,
            }
        }
        events
    }

    fn collect(&mut self, output: EngineOutput) -> Vec<LifecycleEvent> {
        self.gestures += output
            .events
            .iter()
            .filter(|e| e.phase == LifecyclePhase::Start)
            .count() as u64;
        output.events
    }
}
