use super::*;
use statig::prelude::*;

mod lifecycle;

pub(super) struct GestureHsm {
    bindings: Arc<BindingTable>,
    tuning: EngineTuning,
    pub(super) phase: EnginePhase,
    pub(super) candidate: Option<GestureCandidate>,
    pub(super) instance: Option<GestureInstance>,
    next_instance_id: u64,
    last_finger_count: u8,
    last_eval_ms: u64,
    pub(super) last_trace: EngineTrace,
}

#[state_machine(initial = "State::idle()")]
impl GestureHsm {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &GestureHsmEvent) -> Outcome<State> {
        let _ = context;
        match event {
            GestureHsmEvent::Frame(snapshot) => {
                self.last_finger_count = snapshot.finger_count;
                if snapshot.is_released() || !snapshot.is_well_formed() {
                    return self.stay(snapshot.t_ms);
                }
                if !self.bindings.tracks_fingers(snapshot.finger_count) {
                    // Counts nothing is bound to never become candidates.
                    return self.stay(snapshot.t_ms);
                }
                self.begin_candidate(snapshot);
                Transition(State::candidate())
            }
            GestureHsmEvent::Timer { now_ms } | GestureHsmEvent::Cancel { now_ms, .. } => {
                self.stay(*now_ms)
            }
        }
    }

    #[state(superstate = "engaged")]
    fn candidate(
        &mut self,
        context: &mut DispatchContext,
        event: &GestureHsmEvent,
    ) -> Outcome<State> {
        match event {
            GestureHsmEvent::Frame(snapshot) => {
                self.last_finger_count = snapshot.finger_count;
                let Some(fingers) = self.candidate.as_ref().map(|c| c.finger_count_at_start) else {
                    return self.to_idle(snapshot.t_ms, None);
                };
                if snapshot.is_released() {
                    return self.to_idle(snapshot.t_ms, Some(DiscardReason::Lifted));
                }
                if snapshot.finger_count != fingers {
                    if snapshot.is_well_formed()
                        && self.bindings.tracks_fingers(snapshot.finger_count)
                    {
                        // Fingers rarely land in the same frame; restart on the new count.
                        self.begin_candidate(snapshot);
                        return Handled;
                    }
                    return self.to_idle(snapshot.t_ms, Some(DiscardReason::FingersChanged));
                }
                if !snapshot.is_well_formed() {
                    return self.to_idle(snapshot.t_ms, Some(DiscardReason::Malformed));
                }
                if let Some(candidate) = self.candidate.as_mut() {
                    candidate.latest = snapshot.clone();
                }
                self.evaluate_candidate(context, snapshot.t_ms)
            }
            GestureHsmEvent::Timer { now_ms } => self.evaluate_candidate(context, *now_ms),
            GestureHsmEvent::Cancel { .. } => Super,
        }
    }

    #[state(superstate = "engaged")]
    fn active(&mut self, context: &mut DispatchContext, event: &GestureHsmEvent) -> Outcome<State> {
        match event {
            GestureHsmEvent::Frame(snapshot) => {
                self.last_finger_count = snapshot.finger_count;
                let Some(fingers) = self.instance.as_ref().map(GestureInstance::fingers) else {
                    return self.to_idle(snapshot.t_ms, None);
                };
                if snapshot.finger_count != fingers {
                    return self.begin_release(context, snapshot.t_ms);
                }
                if snapshot.is_well_formed() {
                    self.apply_motion(context, snapshot);
                }
                self.stay(snapshot.t_ms)
            }
            GestureHsmEvent::Timer { now_ms } => self.stay(*now_ms),
            GestureHsmEvent::Cancel { .. } => Super,
        }
    }

    #[state(superstate = "engaged")]
    fn releasing(
        &mut self,
        context: &mut DispatchContext,
        event: &GestureHsmEvent,
    ) -> Outcome<State> {
        match event {
            GestureHsmEvent::Frame(snapshot) => {
                self.last_finger_count = snapshot.finger_count;
                let Some(fingers) = self.instance.as_ref().map(GestureInstance::fingers) else {
                    return self.to_idle(snapshot.t_ms, None);
                };
                if self.grace_elapsed(snapshot.t_ms) {
                    self.finish_instance(context, snapshot.t_ms, false);
                    return self.after_end(snapshot.t_ms);
                }
                if snapshot.finger_count == fingers && snapshot.is_well_formed() {
                    self.resume_instance(snapshot);
                    return Transition(State::active());
                }
                self.stay(snapshot.t_ms)
            }
            GestureHsmEvent::Timer { now_ms } => {
                if self.grace_elapsed(*now_ms) {
                    self.finish_instance(context, *now_ms, false);
                    return self.after_end(*now_ms);
                }
                self.stay(*now_ms)
            }
            GestureHsmEvent::Cancel { .. } => Super,
        }
    }

    #[state]
    fn await_release(
        &mut self,
        context: &mut DispatchContext,
        event: &GestureHsmEvent,
    ) -> Outcome<State> {
        let _ = context;
        match event {
            GestureHsmEvent::Frame(snapshot) => {
                self.last_finger_count = snapshot.finger_count;
                if snapshot.is_released() {
                    return self.to_idle(snapshot.t_ms, None);
                }
                self.stay(snapshot.t_ms)
            }
            GestureHsmEvent::Timer { now_ms } => self.stay(*now_ms),
            GestureHsmEvent::Cancel { now_ms, .. } => {
                self.last_finger_count = 0;
                self.to_idle(*now_ms, None)
            }
        }
    }

    #[superstate]
    fn engaged(&mut self, context: &mut DispatchContext, event: &GestureHsmEvent) -> Outcome<State> {
        match event {
            GestureHsmEvent::Cancel { now_ms, reason } => {
                let discard = if self.instance.is_some() {
                    self.finish_instance(context, *now_ms, true);
                    None
                } else {
                    self.candidate
                        .as_ref()
                        .map(|_| DiscardReason::Cancelled(*reason))
                };
                self.last_finger_count = 0;
                self.to_idle(*now_ms, discard)
            }
            _ => Handled,
        }
    }
}
