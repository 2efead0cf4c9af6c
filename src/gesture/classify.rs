use core::f64::consts::PI;

use crate::binding::KindSet;
use crate::config::EngineTuning;

use super::types::{
    centroid_of, mean_spread_of, Direction, GestureKind, GestureMotion, TouchPoint, TouchSnapshot,
};

/// Geometric change between two snapshots with the same finger count.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionFeatures {
    pub dx: f64,
    pub dy: f64,
    /// Current mean spread over origin mean spread; 1.0 below two fingers.
    pub spread_ratio: f64,
    /// Mean finger rotation around the centroid, degrees, positive clockwise
    /// in device coordinates (y grows downward).
    pub rotation_deg: f64,
}

impl MotionFeatures {
    pub fn translation(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Pending,
    Decided {
        kind: GestureKind,
        direction: Direction,
    },
}

/// Fingers whose distance from the centroid is below this fraction of the
/// mean distance carry no usable angle and are left out of the rotation.
const MIN_ROTATION_RADIUS_RATIO: f64 = 0.25;

/// `None` when the snapshots cannot be compared (finger count differs,
/// either is malformed or empty, or no slot is present in both).
///
/// Fingers are paired by contact slot; only slots present in both snapshots
/// contribute.
pub fn motion_features(origin: &TouchSnapshot, current: &TouchSnapshot) -> Option<MotionFeatures> {
    if origin.finger_count != current.finger_count
        || !origin.is_well_formed()
        || !current.is_well_formed()
    {
        return None;
    }
    let (before, after): (Vec<TouchPoint>, Vec<TouchPoint>) = origin
        .slots
        .iter()
        .zip(&origin.positions)
        .filter_map(|(slot, p0)| current.position_of(*slot).map(|p1| (*p0, p1)))
        .unzip();
    let c0 = centroid_of(&before)?;
    let c1 = centroid_of(&after)?;

    let spread_ratio = match (mean_spread_of(&before), mean_spread_of(&after)) {
        (Some(s0), Some(s1)) if s0 > f64::EPSILON => s1 / s0,
        _ => 1.0,
    };

    Some(MotionFeatures {
        dx: c1.x - c0.x,
        dy: c1.y - c0.y,
        spread_ratio,
        rotation_deg: rotation_deg(&before, &after, c0, c1),
    })
}

/// Mean angle change of the fingers around their centroid, weighted by
/// distance from it.
fn rotation_deg(before: &[TouchPoint], after: &[TouchPoint], c0: TouchPoint, c1: TouchPoint) -> f64 {
    if before.len() < 2 {
        return 0.0;
    }
    let mean_radius = before.iter().map(|p| p.distance(c0)).sum::<f64>() / before.len() as f64;
    let floor = mean_radius * MIN_ROTATION_RADIUS_RATIO;

    let (mut weighted, mut total_weight) = (0.0, 0.0);
    for (p0, p1) in before.iter().zip(after) {
        let weight = p0.distance(c0).min(p1.distance(c1));
        if weight <= f64::EPSILON || weight < floor {
            continue;
        }
        let a0 = (p0.y - c0.y).atan2(p0.x - c0.x);
        let a1 = (p1.y - c1.y).atan2(p1.x - c1.x);
        weighted += weight * wrap_angle(a1 - a0);
        total_weight += weight;
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    (weighted / total_weight).to_degrees()
}

fn wrap_angle(mut radians: f64) -> f64 {
    while radians > PI {
        radians -= 2.0 * PI;
    }
    while radians <= -PI {
        radians += 2.0 * PI;
    }
    radians
}

/// Quantize a translation into one of eight compass buckets, `Any` for no
/// translation. `oblique_ratio` is the minor/major axis ratio above which the
/// diagonal wins; tan(22.5°) gives equal 45° sectors.
pub fn quantize_direction(dx: f64, dy: f64, oblique_ratio: f64) -> Direction {
    let ax = dx.abs();
    let ay = dy.abs();
    if ax == 0.0 && ay == 0.0 {
        return Direction::Any;
    }

    let horizontal = if dx < 0.0 { Direction::W } else { Direction::E };
    let vertical = if dy < 0.0 { Direction::N } else { Direction::S };
    let (primary, ratio) = if ax > ay {
        (horizontal, ay / ax)
    } else {
        (vertical, ax / ay)
    };

    if ratio <= oblique_ratio {
        return primary;
    }
    match (vertical, horizontal) {
        (Direction::N, Direction::E) => Direction::NE,
        (Direction::N, _) => Direction::NW,
        (_, Direction::E) => Direction::SE,
        _ => Direction::SW,
    }
}

pub fn pinch_direction(features: &MotionFeatures, tuning: &EngineTuning) -> Direction {
    let scale_score = (features.spread_ratio - 1.0).abs() / tuning.pinch_threshold;
    let rotate_score = features.rotation_deg.abs() / tuning.rotate_threshold_deg;
    if rotate_score > scale_score {
        if features.rotation_deg > 0.0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    } else if features.spread_ratio > 1.0 {
        Direction::Out
    } else {
        Direction::In
    }
}

/// Decide the kind and direction of a candidate.
///
/// Only kinds in `allowed` are considered. Past `classify-window-ms` an
/// undecided candidate that is not resting toward a bound hold becomes an
/// ambiguous swipe (`Any`) instead of being dropped.
pub fn classify(
    features: &MotionFeatures,
    fingers: u8,
    elapsed_ms: u64,
    allowed: KindSet,
    tuning: &EngineTuning,
) -> Classification {
    let swipe_score = if allowed.swipe {
        features.translation() / tuning.swipe_threshold
    } else {
        0.0
    };
    let (scale_score, rotate_score) = if allowed.pinch && fingers >= 2 {
        (
            (features.spread_ratio - 1.0).abs() / tuning.pinch_threshold,
            features.rotation_deg.abs() / tuning.rotate_threshold_deg,
        )
    } else {
        (0.0, 0.0)
    };
    let pinch_score = scale_score.max(rotate_score);

    if swipe_score >= 1.0 || pinch_score >= 1.0 {
        return if swipe_score >= pinch_score {
            Classification::Decided {
                kind: GestureKind::Swipe,
                direction: quantize_direction(features.dx, features.dy, tuning.oblique_ratio),
            }
        } else {
            Classification::Decided {
                kind: GestureKind::Pinch,
                direction: pinch_direction(features, tuning),
            }
        };
    }

    let stationary = features.translation() <= tuning.hold_motion_tolerance
        && (features.spread_ratio - 1.0).abs() <= tuning.hold_spread_tolerance;
    if allowed.hold && stationary {
        // A resting candidate waits for the hold duration even past the
        // classification window.
        if elapsed_ms >= tuning.hold_ms {
            return Classification::Decided {
                kind: GestureKind::Hold,
                direction: Direction::Any,
            };
        }
        return Classification::Pending;
    }

    if elapsed_ms >= tuning.classify_window_ms {
        return Classification::Decided {
            kind: GestureKind::Swipe,
            direction: Direction::Any,
        };
    }

    Classification::Pending
}

/// Cumulative motion for an active instance: the motion carried from earlier
/// contact segments combined with the change within the current one.
pub fn accumulate(carried: &GestureMotion, segment: &MotionFeatures) -> GestureMotion {
    match *carried {
        GestureMotion::Swipe { delta_x, delta_y } => GestureMotion::Swipe {
            delta_x: delta_x + segment.dx,
            delta_y: delta_y + segment.dy,
        },
        GestureMotion::Pinch { scale, delta_angle } => GestureMotion::Pinch {
            scale: scale * segment.spread_ratio,
            delta_angle: delta_angle + segment.rotation_deg,
        },
        GestureMotion::Hold => GestureMotion::Hold,
    }
}

#[cfg(test)]
mod tests;
