use std::sync::Arc;

use statig::blocking::IntoStateMachineExt as _;

use crate::binding::BindingTable;
use crate::config::EngineTuning;

use super::types::{
    CancelReason, GestureCandidate, GestureInstance, GestureKind, LifecycleEvent, TouchSnapshot,
};

mod hsm;

use hsm::GestureHsm;

#[derive(Clone, Debug)]
enum GestureHsmEvent {
    Frame(TouchSnapshot),
    Timer { now_ms: u64 },
    Cancel { now_ms: u64, reason: CancelReason },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnginePhase {
    #[default]
    Idle,
    Candidate,
    Active,
    /// Fingers lifted; the instance is still live until its grace window
    /// elapses.
    Releasing,
    /// A gesture finished or was discarded while fingers stayed down; no new
    /// candidate starts until the surface is clear.
    AwaitRelease,
}

/// Why a candidate was dropped without dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    /// Classified as this kind, but nothing is bound to it.
    NoBinding(GestureKind),
    Malformed,
    Lifted,
    FingersChanged,
    Cancelled(CancelReason),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineTrace {
    pub t_ms: u64,
    pub phase: EnginePhase,
    pub discard: Option<DiscardReason>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineOutput {
    pub events: Vec<LifecycleEvent>,
    pub trace: EngineTrace,
}

#[derive(Debug, Default)]
struct DispatchContext {
    events: Vec<LifecycleEvent>,
}

impl DispatchContext {
    fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }
}

/// Gesture lifecycle engine: one optional candidate, one optional active
/// instance, advanced only by the thread that owns the engine.
pub struct GestureEngine {
    machine: statig::blocking::StateMachine<GestureHsm>,
}

impl GestureEngine {
    pub fn new(bindings: Arc<BindingTable>, tuning: EngineTuning) -> Self {
        Self {
            machine: GestureHsm::new(bindings, tuning).state_machine(),
        }
    }

    pub fn handle_snapshot(&mut self, snapshot: &TouchSnapshot) -> EngineOutput {
        self.handle(GestureHsmEvent::Frame(snapshot.clone()))
    }

    /// Advance time without a new frame so grace windows and hold timers can
    /// elapse while the device is silent.
    pub fn handle_timer(&mut self, now_ms: u64) -> EngineOutput {
        self.handle(GestureHsmEvent::Timer { now_ms })
    }

    /// Force any candidate or instance through the cancelled path. An active
    /// instance still gets its `end`.
    pub fn cancel(&mut self, now_ms: u64, reason: CancelReason) -> EngineOutput {
        self.handle(GestureHsmEvent::Cancel { now_ms, reason })
    }

    pub fn phase(&self) -> EnginePhase {
        self.machine.inner().phase
    }

    pub fn active_instance(&self) -> Option<&GestureInstance> {
        self.machine.inner().instance.as_ref()
    }

    pub fn candidate(&self) -> Option<&GestureCandidate> {
        self.machine.inner().candidate.as_ref()
    }

    /// Next time at which [`handle_timer`](Self::handle_timer) can change
    /// state.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.machine.inner().next_deadline_ms()
    }

    fn handle(&mut self, event: GestureHsmEvent) -> EngineOutput {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        EngineOutput {
            events: context.events,
            trace: self.machine.inner().last_trace,
        }
    }
}
