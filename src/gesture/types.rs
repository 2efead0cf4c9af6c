use core::fmt;
use core::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: TouchPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Multi-finger state of the touch surface at one time step.
///
/// `positions` is ordered by contact slot and `slots[i]` names the device
/// slot of `positions[i]`, so fingers can be paired across snapshots even
/// when one lifts while another lands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TouchSnapshot {
    pub t_ms: u64,
    pub finger_count: u8,
    pub positions: Vec<TouchPoint>,
    pub slots: Vec<u8>,
}

impl TouchSnapshot {
    /// Positions in slot order, numbered from slot 0.
    pub fn new(t_ms: u64, positions: Vec<TouchPoint>) -> Self {
        let slots = (0..positions.len()).map(|i| i.min(u8::MAX as usize) as u8).collect();
        Self {
            t_ms,
            finger_count: positions.len().min(u8::MAX as usize) as u8,
            positions,
            slots,
        }
    }

    pub fn from_slots(t_ms: u64, fingers: impl IntoIterator<Item = (u8, TouchPoint)>) -> Self {
        let (slots, positions): (Vec<u8>, Vec<TouchPoint>) = fingers.into_iter().unzip();
        Self {
            t_ms,
            finger_count: positions.len().min(u8::MAX as usize) as u8,
            positions,
            slots,
        }
    }

    pub fn released(t_ms: u64) -> Self {
        Self {
            t_ms,
            ..Self::default()
        }
    }

    pub fn is_released(&self) -> bool {
        self.finger_count == 0
    }

    pub fn is_well_formed(&self) -> bool {
        self.positions.len() == self.finger_count as usize
            && self.slots.len() == self.positions.len()
            && self.positions.iter().all(|p| p.is_finite())
    }

    pub fn position_of(&self, slot: u8) -> Option<TouchPoint> {
        let index = self.slots.iter().position(|s| *s == slot)?;
        self.positions.get(index).copied()
    }

    pub fn centroid(&self) -> Option<TouchPoint> {
        centroid_of(&self.positions)
    }

    /// Mean pairwise distance between fingers; `None` below two fingers.
    pub fn mean_spread(&self) -> Option<f64> {
        mean_spread_of(&self.positions)
    }
}

pub fn centroid_of(points: &[TouchPoint]) -> Option<TouchPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(TouchPoint::new(sx / n, sy / n))
}

pub fn mean_spread_of(points: &[TouchPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            total += a.distance(*b);
            pairs += 1;
        }
    }
    Some(total / pairs as f64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Swipe,
    Pinch,
    Hold,
    Unknown,
}

impl GestureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Swipe => "swipe",
            Self::Pinch => "pinch",
            Self::Hold => "hold",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gesture direction.
///
/// ```text
/// NW  N  NE
/// W   .   E
/// SW  S  SE
/// ```
///
/// Compass values apply to swipes, `In`/`Out`/`Clockwise`/`CounterClockwise`
/// to pinches. `Any` is both the binding wildcard and the direction of an
/// ambiguous swipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Any,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
    In,
    Out,
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::N => "n",
            Self::NE => "ne",
            Self::E => "e",
            Self::SE => "se",
            Self::S => "s",
            Self::SW => "sw",
            Self::W => "w",
            Self::NW => "nw",
            Self::In => "in",
            Self::Out => "out",
            Self::Clockwise => "cw",
            Self::CounterClockwise => "ccw",
        }
    }

    pub fn is_compass(self) -> bool {
        matches!(
            self,
            Self::N | Self::NE | Self::E | Self::SE | Self::S | Self::SW | Self::W | Self::NW
        )
    }

    pub fn is_pinch(self) -> bool {
        matches!(
            self,
            Self::In | Self::Out | Self::Clockwise | Self::CounterClockwise
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let direction = match value.trim().to_ascii_lowercase().as_str() {
            "any" => Self::Any,
            "n" => Self::N,
            "ne" => Self::NE,
            "e" => Self::E,
            "se" => Self::SE,
            "s" => Self::S,
            "sw" => Self::SW,
            "w" => Self::W,
            "nw" => Self::NW,
            "in" => Self::In,
            "out" => Self::Out,
            "cw" | "clockwise" => Self::Clockwise,
            "ccw" | "counterclockwise" => Self::CounterClockwise,
            other => return Err(format!("unknown direction `{other}`")),
        };
        Ok(direction)
    }
}

/// Template variables for one lifecycle event. Every field is always present;
/// fields that mean nothing for the gesture kind stay at 0.0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CommandVariables {
    pub delta_x: f64,
    pub delta_y: f64,
    pub scale: f64,
    pub delta_angle: f64,
}

/// Cumulative motion of a gesture instance, tagged by kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureMotion {
    Swipe { delta_x: f64, delta_y: f64 },
    Pinch { scale: f64, delta_angle: f64 },
    Hold,
}

impl GestureMotion {
    pub fn at_origin(kind: GestureKind) -> Self {
        match kind {
            GestureKind::Pinch => Self::Pinch {
                scale: 1.0,
                delta_angle: 0.0,
            },
            GestureKind::Hold => Self::Hold,
            GestureKind::Swipe | GestureKind::Unknown => Self::Swipe {
                delta_x: 0.0,
                delta_y: 0.0,
            },
        }
    }

    pub fn kind(&self) -> GestureKind {
        match self {
            Self::Swipe { .. } => GestureKind::Swipe,
            Self::Pinch { .. } => GestureKind::Pinch,
            Self::Hold => GestureKind::Hold,
        }
    }

    pub fn variables(&self) -> CommandVariables {
        match *self {
            Self::Swipe { delta_x, delta_y } => CommandVariables {
                delta_x,
                delta_y,
                ..CommandVariables::default()
            },
            Self::Pinch { scale, delta_angle } => CommandVariables {
                scale,
                delta_angle,
                ..CommandVariables::default()
            },
            Self::Hold => CommandVariables::default(),
        }
    }

    /// Translation since `previous`; zero unless both are swipes.
    pub fn step_from(&self, previous: &GestureMotion) -> MotionStep {
        match (self, previous) {
            (
                Self::Swipe { delta_x, delta_y },
                Self::Swipe {
                    delta_x: prev_x,
                    delta_y: prev_y,
                },
            ) => MotionStep {
                dx: delta_x - prev_x,
                dy: delta_y - prev_y,
            },
            _ => MotionStep::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionStep {
    pub dx: f64,
    pub dy: f64,
}

/// The identity a gesture is resolved against: fixed at promotion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureDescriptor {
    pub kind: GestureKind,
    pub direction: Direction,
    pub fingers: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureCandidate {
    pub kind: GestureKind,
    pub finger_count_at_start: u8,
    pub origin: TouchSnapshot,
    pub latest: TouchSnapshot,
    pub start_ms: u64,
}

impl GestureCandidate {
    pub fn new(snapshot: &TouchSnapshot) -> Self {
        Self {
            kind: GestureKind::Unknown,
            finger_count_at_start: snapshot.finger_count,
            origin: snapshot.clone(),
            latest: snapshot.clone(),
            start_ms: snapshot.t_ms,
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Active,
    /// All fingers lifted (or the count changed) at `since_ms`; the grace
    /// window is running.
    Releasing { since_ms: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureInstance {
    pub id: u64,
    pub descriptor: GestureDescriptor,
    pub binding: usize,
    pub release_grace_ms: u64,
    /// Cumulative motion since the gesture origin.
    pub motion: GestureMotion,
    /// Motion accumulated before the current contact segment.
    pub(crate) carried: GestureMotion,
    /// First snapshot of the current contact segment; motion within the
    /// segment is measured against it.
    pub(crate) anchor: TouchSnapshot,
    pub last_update_ms: u64,
    pub state: InstanceState,
}

impl GestureInstance {
    pub fn kind(&self) -> GestureKind {
        self.descriptor.kind
    }

    pub fn direction(&self) -> Direction {
        self.descriptor.direction
    }

    pub fn fingers(&self) -> u8 {
        self.descriptor.fingers
    }

    pub fn cumulative_delta(&self) -> (f64, f64) {
        let vars = self.motion.variables();
        (vars.delta_x, vars.delta_y)
    }

    pub fn cumulative_scale(&self) -> f64 {
        match self.motion {
            GestureMotion::Pinch { scale, .. } => scale,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    Update,
    End { cancelled: bool },
}

impl LifecyclePhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Update => "update",
            Self::End { cancelled: false } => "end",
            Self::End { cancelled: true } => "end-cancelled",
        }
    }
}

/// Output of the lifecycle state machine, consumed by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifecycleEvent {
    pub instance_id: u64,
    pub phase: LifecyclePhase,
    pub t_ms: u64,
    pub binding: usize,
    pub descriptor: GestureDescriptor,
    pub variables: CommandVariables,
    pub step: MotionStep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    SourceLost,
    Shutdown,
    External,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceLost => "source_lost",
            Self::Shutdown => "shutdown",
            Self::External => "external",
        }
    }
}
