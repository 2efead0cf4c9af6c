use std::sync::Arc;

use serde::Serialize;
use tracing::{trace, warn};

use crate::binding::{Binding, BindingTable};
use crate::gesture::types::{GestureKind, LifecycleEvent, LifecyclePhase};

use super::template::TemplateRenderer;

/// Actions whose text starts with this prefix are injected as key presses
/// instead of being run by the shell.
pub const KEY_ACTION_PREFIX: &str = "key:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchAction {
    Run { command: String },
    KeyPress { keys: String },
    PointerDown,
    PointerMove { dx: i32, dy: i32 },
    PointerUp,
}

/// Scaling from gesture translation to synthetic pointer motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerScale {
    pub reference_speed: f64,
    pub speed_multiplier: f64,
}

impl PointerScale {
    fn factor(&self, acceleration: f64) -> f64 {
        acceleration * self.speed_multiplier / self.reference_speed
    }
}

#[derive(Clone, Copy, Debug)]
struct DragState {
    instance_id: u64,
    residue_x: f64,
    residue_y: f64,
}

/// Turns lifecycle events into concrete actions. Pure apart from the drag
/// residue it carries between updates of one instance.
pub struct ActionPlanner {
    bindings: Arc<BindingTable>,
    templates: TemplateRenderer,
    /// `None` disables drag emulation.
    pointer: Option<PointerScale>,
    drag: Option<DragState>,
}

impl ActionPlanner {
    pub fn new(
        bindings: Arc<BindingTable>,
        pointer: Option<PointerScale>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            bindings,
            templates: TemplateRenderer::new()?,
            pointer,
            drag: None,
        })
    }

    pub fn set_pointer_scale(&mut self, pointer: Option<PointerScale>) {
        self.pointer = pointer;
    }

    pub fn plan(&mut self, event: &LifecycleEvent) -> Vec<DispatchAction> {
        let bindings = Arc::clone(&self.bindings);
        let Some(binding) = bindings.get(event.binding) else {
            warn!(binding = event.binding, "dispatch: event refers to unknown binding");
            return Vec::new();
        };

        let mut actions = Vec::new();
        if let Some(action) = self.pointer_action(binding, event) {
            actions.push(action);
        }
        if let Some(template) = template_for(binding, event.phase) {
            let text = self.templates.render(template, &event.variables);
            actions.push(command_action(text));
        }
        trace!(
            id = event.instance_id,
            phase = event.phase.label(),
            count = actions.len(),
            "dispatch: planned"
        );
        actions
    }

    fn pointer_action(&mut self, binding: &Binding, event: &LifecycleEvent) -> Option<DispatchAction> {
        let acceleration = binding.acceleration?;
        let scale = self.pointer?;
        match event.phase {
            LifecyclePhase::Start => {
                self.drag = Some(DragState {
                    instance_id: event.instance_id,
                    residue_x: 0.0,
                    residue_y: 0.0,
                });
                Some(DispatchAction::PointerDown)
            }
            LifecyclePhase::Update => {
                let drag = self
                    .drag
                    .as_mut()
                    .filter(|drag| drag.instance_id == event.instance_id)?;
                let factor = scale.factor(acceleration);
                let x = event.step.dx * factor + drag.residue_x;
                let y = event.step.dy * factor + drag.residue_y;
                let (dx, dy) = (x.trunc(), y.trunc());
                drag.residue_x = x - dx;
                drag.residue_y = y - dy;
                if dx == 0.0 && dy == 0.0 {
                    return None;
                }
                Some(DispatchAction::PointerMove {
                    dx: dx as i32,
                    dy: dy as i32,
                })
            }
            LifecyclePhase::End { .. } => {
                let drag = self.drag.take()?;
                (drag.instance_id == event.instance_id).then_some(DispatchAction::PointerUp)
            }
        }
    }
}

fn template_for(binding: &Binding, phase: LifecyclePhase) -> Option<&str> {
    match phase {
        LifecyclePhase::Start => binding.on_start.as_deref(),
        LifecyclePhase::Update => binding.on_update.as_deref(),
        // A hold that never completed has nothing to undo.
        LifecyclePhase::End { cancelled: true } if binding.kind == GestureKind::Hold => None,
        LifecyclePhase::End { .. } => binding.on_end.as_deref(),
    }
}

fn command_action(text: String) -> DispatchAction {
    match text.trim_start().strip_prefix(KEY_ACTION_PREFIX) {
        Some(keys) => DispatchAction::KeyPress {
            keys: keys.trim().to_string(),
        },
        None => DispatchAction::Run { command: text },
    }
}
