//! Configuration consumed by the daemon.
//!
//! Bindings are an ordered `[[gesture]]` array; declaration order is the tie
//! break used by [`BindingTable::resolve`]. The `[engine]`, `[pointer]` and
//! `[runtime]` tables hold recognition thresholds and runtime knobs, all
//! optional.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::binding::{Binding, BindingTable};
use crate::gesture::types::{Direction, GestureKind};

const MAX_FINGERS: u8 = 10;
const MAX_MOUSE_UP_DELAY_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("gesture #{index} ({kind}): {reason}")]
    InvalidBinding {
        index: usize,
        kind: &'static str,
        reason: String,
    },
    #[error("invalid [{table}] setting: {reason}")]
    InvalidSetting { table: &'static str, reason: String },
    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,
}

/// Recognition thresholds. Distances are in device units.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineTuning {
    pub dwell_ms: u64,
    pub classify_window_ms: u64,
    pub hold_ms: u64,
    pub swipe_threshold: f64,
    pub pinch_threshold: f64,
    pub rotate_threshold_deg: f64,
    pub hold_motion_tolerance: f64,
    pub hold_spread_tolerance: f64,
    pub release_grace_ms: u64,
    pub dropout_tolerance_ms: u64,
    pub oblique_ratio: f64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            dwell_ms: 30,
            classify_window_ms: 250,
            hold_ms: 300,
            swipe_threshold: 24.0,
            pinch_threshold: 0.12,
            rotate_threshold_deg: 15.0,
            hold_motion_tolerance: 6.0,
            hold_spread_tolerance: 0.05,
            release_grace_ms: 0,
            dropout_tolerance_ms: 24,
            oblique_ratio: 1.0 / (1.0 + core::f64::consts::SQRT_2),
        }
    }
}

impl EngineTuning {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSetting {
            table: "engine",
            reason,
        };
        for (name, value) in [
            ("swipe-threshold", self.swipe_threshold),
            ("pinch-threshold", self.pinch_threshold),
            ("rotate-threshold-deg", self.rotate_threshold_deg),
            ("oblique-ratio", self.oblique_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{name} must be a positive number")));
            }
        }
        for (name, value) in [
            ("hold-motion-tolerance", self.hold_motion_tolerance),
            ("hold-spread-tolerance", self.hold_spread_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{name} must not be negative")));
            }
        }
        if self.classify_window_ms < self.dwell_ms {
            return Err(invalid(
                "classify-window-ms must not be shorter than dwell-ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PointerBackendKind {
    Xdotool,
    None,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PointerSettings {
    pub backend: PointerBackendKind,
    /// Divisor applied to `acceleration` when scaling drag motion.
    pub reference_speed: f64,
    /// Used when the system pointer speed cannot be queried.
    pub default_speed_multiplier: f64,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            backend: PointerBackendKind::Xdotool,
            reference_speed: 10.0,
            default_speed_multiplier: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeSettings {
    pub queue_capacity: usize,
    pub reconnect_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            reconnect_backoff_ms: 500,
            max_reconnect_attempts: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum GestureEntry {
    Swipe(MotionEntry),
    Pinch(MotionEntry),
    Hold(HoldEntry),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct MotionEntry {
    #[serde(default = "any_direction")]
    direction: String,
    fingers: u8,
    start: Option<String>,
    update: Option<String>,
    end: Option<String>,
    mouse_up_delay: Option<u64>,
    acceleration: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HoldEntry {
    fingers: u8,
    action: Option<String>,
}

fn any_direction() -> String {
    "any".to_string()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    #[serde(rename = "gesture")]
    gestures: Vec<GestureEntry>,
    engine: EngineTuning,
    pointer: PointerSettings,
    runtime: RuntimeSettings,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub bindings: BindingTable,
    pub engine: EngineTuning,
    pub pointer: PointerSettings,
    pub runtime: RuntimeSettings,
}

impl Config {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        file.engine.validate()?;
        if !(file.pointer.reference_speed.is_finite() && file.pointer.reference_speed > 0.0) {
            return Err(ConfigError::InvalidSetting {
                table: "pointer",
                reason: "reference-speed must be a positive number".into(),
            });
        }
        if !(file.pointer.default_speed_multiplier.is_finite()
            && file.pointer.default_speed_multiplier > 0.0)
        {
            return Err(ConfigError::InvalidSetting {
                table: "pointer",
                reason: "default-speed-multiplier must be a positive number".into(),
            });
        }
        if file.runtime.queue_capacity == 0 {
            return Err(ConfigError::InvalidSetting {
                table: "runtime",
                reason: "queue-capacity must be at least 1".into(),
            });
        }

        let bindings = file
            .gestures
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_binding(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bindings: BindingTable::new(bindings),
            engine: file.engine,
            pointer: file.pointer,
            runtime: file.runtime,
        })
    }

    pub fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Default location: `$XDG_CONFIG_HOME/gestured/config.toml`, else
    /// `$HOME/.config/gestured/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
                .ok_or(ConfigError::NoConfigDir)?,
        };
        Ok(base.join("gestured").join("config.toml"))
    }

    pub fn read_default_config() -> Result<Self, ConfigError> {
        Self::read_from_file(&Self::default_path()?)
    }
}

impl GestureEntry {
    fn into_binding(self, index: usize) -> Result<Binding, ConfigError> {
        let kind = match &self {
            Self::Swipe(_) => GestureKind::Swipe,
            Self::Pinch(_) => GestureKind::Pinch,
            Self::Hold(_) => GestureKind::Hold,
        };
        let invalid = |reason: String| ConfigError::InvalidBinding {
            index,
            kind: kind.as_str(),
            reason,
        };

        match self {
            Self::Swipe(entry) | Self::Pinch(entry) => {
                check_fingers(entry.fingers).map_err(invalid)?;
                let direction: Direction = entry.direction.parse().map_err(invalid)?;
                if kind == GestureKind::Swipe && direction.is_pinch() {
                    return Err(invalid(format!(
                        "direction `{direction}` is not a swipe direction"
                    )));
                }
                if kind == GestureKind::Pinch {
                    if direction.is_compass() {
                        return Err(invalid(format!(
                            "direction `{direction}` is not a pinch direction"
                        )));
                    }
                    if entry.fingers < 2 {
                        return Err(invalid("pinch needs at least 2 fingers".into()));
                    }
                    if entry.mouse_up_delay.is_some() || entry.acceleration.is_some() {
                        return Err(invalid(
                            "mouse-up-delay and acceleration apply to swipes only".into(),
                        ));
                    }
                }
                if let Some(delay) = entry.mouse_up_delay {
                    if delay > MAX_MOUSE_UP_DELAY_MS {
                        return Err(invalid(format!(
                            "mouse-up-delay {delay} exceeds {MAX_MOUSE_UP_DELAY_MS} ms"
                        )));
                    }
                }
                if let Some(accel) = entry.acceleration {
                    if !(accel.is_finite() && accel > 0.0) {
                        return Err(invalid("acceleration must be a positive number".into()));
                    }
                }
                Ok(Binding {
                    kind,
                    direction,
                    fingers: entry.fingers,
                    on_start: non_empty(entry.start),
                    on_update: non_empty(entry.update),
                    on_end: non_empty(entry.end),
                    mouse_up_delay_ms: entry.mouse_up_delay,
                    acceleration: entry.acceleration,
                })
            }
            Self::Hold(entry) => {
                check_fingers(entry.fingers).map_err(invalid)?;
                Ok(Binding {
                    kind,
                    direction: Direction::Any,
                    fingers: entry.fingers,
                    on_start: None,
                    on_update: None,
                    on_end: non_empty(entry.action),
                    mouse_up_delay_ms: None,
                    acceleration: None,
                })
            }
        }
    }
}

fn check_fingers(fingers: u8) -> Result<(), String> {
    if (1..=MAX_FINGERS).contains(&fingers) {
        Ok(())
    } else {
        Err(format!("fingers must be within 1..={MAX_FINGERS}, got {fingers}"))
    }
}

fn non_empty(template: Option<String>) -> Option<String> {
    template.filter(|t| !t.trim().is_empty())
}
