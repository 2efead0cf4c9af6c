use super::*;

use tracing::{debug, info};

use crate::gesture::classify::{accumulate, classify, motion_features, Classification};
use crate::gesture::types::{
    GestureDescriptor, GestureKind, GestureMotion, InstanceState, LifecyclePhase, MotionStep,
};

impl GestureHsm {
    pub(crate) fn new(bindings: Arc<BindingTable>, tuning: EngineTuning) -> Self {
        Self {
            bindings,
            tuning,
            phase: EnginePhase::Idle,
            candidate: None,
            instance: None,
            next_instance_id: 1,
            last_finger_count: 0,
            last_eval_ms: 0,
            last_trace: EngineTrace::default(),
        }
    }

    pub(crate) fn next_deadline_ms(&self) -> Option<u64> {
        match self.phase {
            EnginePhase::Candidate => {
                let candidate = self.candidate.as_ref()?;
                [
                    self.tuning.dwell_ms,
                    self.tuning.hold_ms,
                    self.tuning.classify_window_ms,
                ]
                .into_iter()
                .map(|offset| candidate.start_ms.saturating_add(offset))
                .filter(|deadline| *deadline > self.last_eval_ms)
                .min()
            }
            EnginePhase::Releasing => {
                let instance = self.instance.as_ref()?;
                match instance.state {
                    InstanceState::Releasing { since_ms } => {
                        Some(since_ms.saturating_add(instance.release_grace_ms))
                    }
                    InstanceState::Active => None,
                }
            }
            _ => None,
        }
    }

    fn record(&mut self, phase: EnginePhase, t_ms: u64, discard: Option<DiscardReason>) {
        self.phase = phase;
        self.last_trace = EngineTrace {
            t_ms,
            phase,
            discard,
        };
    }

    pub(super) fn stay(&mut self, t_ms: u64) -> Outcome<State> {
        self.record(self.phase, t_ms, None);
        Handled
    }

    pub(super) fn to_idle(&mut self, t_ms: u64, discard: Option<DiscardReason>) -> Outcome<State> {
        if let Some(reason) = discard {
            debug!(?reason, t_ms, "engine: candidate discarded");
        }
        self.candidate = None;
        self.instance = None;
        self.record(EnginePhase::Idle, t_ms, discard);
        Transition(State::idle())
    }

    fn to_await_release(&mut self, t_ms: u64, discard: Option<DiscardReason>) -> Outcome<State> {
        self.candidate = None;
        self.instance = None;
        self.record(EnginePhase::AwaitRelease, t_ms, discard);
        Transition(State::await_release())
    }

    pub(super) fn begin_candidate(&mut self, snapshot: &TouchSnapshot) {
        self.candidate = Some(GestureCandidate::new(snapshot));
        self.last_eval_ms = snapshot.t_ms;
        self.record(EnginePhase::Candidate, snapshot.t_ms, None);
    }

    pub(super) fn evaluate_candidate(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
    ) -> Outcome<State> {
        self.last_eval_ms = self.last_eval_ms.max(now_ms);
        let Some(candidate) = self.candidate.as_ref() else {
            return self.to_idle(now_ms, None);
        };
        let elapsed_ms = candidate.elapsed_ms(now_ms);
        if elapsed_ms < self.tuning.dwell_ms {
            return self.stay(now_ms);
        }
        let Some(features) = motion_features(&candidate.origin, &candidate.latest) else {
            return self.to_idle(now_ms, Some(DiscardReason::Malformed));
        };

        let fingers = candidate.finger_count_at_start;
        let allowed = self.bindings.kinds_for_fingers(fingers);
        let (kind, direction) = match classify(&features, fingers, elapsed_ms, allowed, &self.tuning) {
            Classification::Pending => return self.stay(now_ms),
            Classification::Decided { kind, direction } => (kind, direction),
        };
        if let Some(candidate) = self.candidate.as_mut() {
            candidate.kind = kind;
        }
        let descriptor = GestureDescriptor {
            kind,
            direction,
            fingers,
        };

        let bindings = Arc::clone(&self.bindings);
        let Some((index, binding)) = bindings.resolve(&descriptor) else {
            debug!(
                kind = %descriptor.kind,
                direction = %descriptor.direction,
                fingers,
                "engine: no binding for gesture"
            );
            // Fingers are still down; the next candidate waits for a clean surface.
            return self.to_await_release(now_ms, Some(DiscardReason::NoBinding(kind)));
        };
        let release_grace_ms = binding
            .mouse_up_delay_ms
            .unwrap_or(self.tuning.release_grace_ms);
        self.promote(context, descriptor, index, release_grace_ms, now_ms);
        Transition(State::active())
    }

    fn promote(
        &mut self,
        context: &mut DispatchContext,
        descriptor: GestureDescriptor,
        binding: usize,
        release_grace_ms: u64,
        now_ms: u64,
    ) {
        let Some(candidate) = self.candidate.take() else {
            return;
        };
        let origin_motion = GestureMotion::at_origin(candidate.kind);
        let motion = motion_features(&candidate.origin, &candidate.latest)
            .map(|features| accumulate(&origin_motion, &features))
            .unwrap_or(origin_motion);

        let id = self.next_instance_id;
        self.next_instance_id = self.next_instance_id.wrapping_add(1);
        let instance = GestureInstance {
            id,
            descriptor,
            binding,
            release_grace_ms,
            motion,
            carried: origin_motion,
            anchor: candidate.origin,
            last_update_ms: now_ms,
            state: InstanceState::Active,
        };
        info!(
            id,
            kind = %descriptor.kind,
            direction = %descriptor.direction,
            fingers = descriptor.fingers,
            binding,
            "engine: gesture started"
        );

        emit(
            context,
            &instance,
            LifecyclePhase::Start,
            now_ms,
            origin_motion,
            MotionStep::default(),
        );
        // Movement made while classifying is reported right away.
        if descriptor.kind != GestureKind::Hold && motion != origin_motion {
            emit(
                context,
                &instance,
                LifecyclePhase::Update,
                now_ms,
                motion,
                motion.step_from(&origin_motion),
            );
        }
        self.instance = Some(instance);
        self.record(EnginePhase::Active, now_ms, None);
    }

    pub(super) fn apply_motion(&mut self, context: &mut DispatchContext, snapshot: &TouchSnapshot) {
        let Some(instance) = self.instance.as_mut() else {
            return;
        };
        if instance.kind() == GestureKind::Hold {
            return;
        }
        let Some(features) = motion_features(&instance.anchor, snapshot) else {
            return;
        };
        let motion = accumulate(&instance.carried, &features);
        if motion == instance.motion {
            return;
        }
        let step = motion.step_from(&instance.motion);
        instance.motion = motion;
        instance.last_update_ms = snapshot.t_ms;
        emit(
            context,
            instance,
            LifecyclePhase::Update,
            snapshot.t_ms,
            motion,
            step,
        );
    }

    pub(super) fn begin_release(
        &mut self,
        context: &mut DispatchContext,
        t_ms: u64,
    ) -> Outcome<State> {
        let Some(instance) = self.instance.as_mut() else {
            return self.to_idle(t_ms, None);
        };
        instance.state = InstanceState::Releasing { since_ms: t_ms };
        instance.carried = instance.motion;
        if instance.release_grace_ms == 0 {
            self.finish_instance(context, t_ms, false);
            return self.after_end(t_ms);
        }
        debug!(id = instance.id, t_ms, "engine: fingers lifted, grace running");
        self.record(EnginePhase::Releasing, t_ms, None);
        Transition(State::releasing())
    }

    pub(super) fn grace_elapsed(&self, now_ms: u64) -> bool {
        match self.instance.as_ref().map(|i| (i.state, i.release_grace_ms)) {
            Some((InstanceState::Releasing { since_ms }, grace_ms)) => {
                now_ms.saturating_sub(since_ms) >= grace_ms
            }
            _ => false,
        }
    }

    /// Same finger count is back within the grace window: the gesture goes on
    /// from the new contact position, keeping the motion accumulated so far.
    pub(super) fn resume_instance(&mut self, snapshot: &TouchSnapshot) {
        if let Some(instance) = self.instance.as_mut() {
            debug!(id = instance.id, t_ms = snapshot.t_ms, "engine: gesture resumed");
            instance.anchor = snapshot.clone();
            instance.state = InstanceState::Active;
        }
        self.record(EnginePhase::Active, snapshot.t_ms, None);
    }

    pub(super) fn finish_instance(
        &mut self,
        context: &mut DispatchContext,
        t_ms: u64,
        cancelled: bool,
    ) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        let (delta_x, delta_y) = instance.cumulative_delta();
        info!(
            id = instance.id,
            cancelled,
            direction = %instance.direction(),
            delta_x,
            delta_y,
            scale = instance.cumulative_scale(),
            idle_ms = t_ms.saturating_sub(instance.last_update_ms),
            "engine: gesture ended"
        );
        emit(
            context,
            &instance,
            LifecyclePhase::End { cancelled },
            t_ms,
            instance.motion,
            MotionStep::default(),
        );
    }

    pub(super) fn after_end(&mut self, t_ms: u64) -> Outcome<State> {
        if self.last_finger_count == 0 {
            self.to_idle(t_ms, None)
        } else {
            self.to_await_release(t_ms, None)
        }
    }
}

fn emit(
    context: &mut DispatchContext,
    instance: &GestureInstance,
    phase: LifecyclePhase,
    t_ms: u64,
    motion: GestureMotion,
    step: MotionStep,
) {
    context.emit(LifecycleEvent {
        instance_id: instance.id,
        phase,
        t_ms,
        binding: instance.binding,
        descriptor: instance.descriptor,
        variables: motion.variables(),
        step,
    });
}
