//! Synthetic input injection.

use std::{
    process::{Command, Stdio},
    sync::LazyLock,
    time::Duration,
};

use regex::Regex;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::DispatchError;

/// Relative pointer motion, button and key injection. Calls are synchronous
/// so injected input keeps issue order.
pub trait PointerBackend: Send {
    fn name(&self) -> &'static str;

    /// System pointer acceleration, if it can be queried.
    fn base_speed(&mut self) -> Option<f64>;

    fn button_down(&mut self) -> Result<(), DispatchError>;

    fn button_up(&mut self) -> Result<(), DispatchError>;

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), DispatchError>;

    fn key_press(&mut self, keys: &str) -> Result<(), DispatchError>;
}

/// How long one `xdotool` call may take before it is killed.
pub const DEFAULT_INJECTION_TIMEOUT: Duration = Duration::from_millis(500);

/// Injection through the `xdotool` command line tool.
pub struct XdotoolBackend {
    program: String,
    timeout: Duration,
}

impl XdotoolBackend {
    pub fn new() -> Self {
        Self::with_program("xdotool", DEFAULT_INJECTION_TIMEOUT)
    }

    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Runs one injection call. The dispatch worker waits on it, so a tool
    /// that hangs is killed once `timeout` passes.
    fn invoke(&self, operation: &'static str, args: &[&str]) -> Result<(), DispatchError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| DispatchError::Injection {
                operation,
                reason: format!("failed to execute {}: {source}", self.program),
            })?;
        let waited = child
            .wait_timeout(self.timeout)
            .map_err(|source| DispatchError::Injection {
                operation,
                reason: format!("failed to wait for {}: {source}", self.program),
            })?;
        let status = match waited {
            Some(status) => status,
            None => {
                if let Err(err) = child.kill() {
                    warn!(%err, program = %self.program, "pointer: kill failed");
                }
                let _ = child.wait();
                return Err(DispatchError::Injection {
                    operation,
                    reason: format!(
                        "{} timed out after {} ms",
                        self.program,
                        self.timeout.as_millis()
                    ),
                });
            }
        };
        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Injection {
                operation,
                reason: format!("{} exited with {status}", self.program),
            })
        }
    }
}

impl Default for XdotoolBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerBackend for XdotoolBackend {
    fn name(&self) -> &'static str {
        "xdotool"
    }

    fn base_speed(&mut self) -> Option<f64> {
        let output = Command::new("xset")
            .arg("q")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            debug!(status = %output.status, "pointer: xset q failed");
            return None;
        }
        parse_xset_acceleration(&String::from_utf8_lossy(&output.stdout))
    }

    fn button_down(&mut self) -> Result<(), DispatchError> {
        self.invoke("button down", &["mousedown", "1"])
    }

    fn button_up(&mut self) -> Result<(), DispatchError> {
        self.invoke("button up", &["mouseup", "1"])
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), DispatchError> {
        let (dx, dy) = (dx.to_string(), dy.to_string());
        self.invoke("pointer move", &["mousemove_relative", "--", &dx, &dy])
    }

    fn key_press(&mut self, keys: &str) -> Result<(), DispatchError> {
        self.invoke("key press", &["key", "--", keys])
    }
}

/// Backend used when injection is disabled; every call reports it.
#[derive(Default)]
pub struct NullBackend;

impl NullBackend {
    fn unavailable(operation: &'static str) -> Result<(), DispatchError> {
        Err(DispatchError::Injection {
            operation,
            reason: "input injection is disabled".to_string(),
        })
    }
}

impl PointerBackend for NullBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn base_speed(&mut self) -> Option<f64> {
        None
    }

    fn button_down(&mut self) -> Result<(), DispatchError> {
        Self::unavailable("button down")
    }

    fn button_up(&mut self) -> Result<(), DispatchError> {
        Self::unavailable("button up")
    }

    fn move_relative(&mut self, _dx: i32, _dy: i32) -> Result<(), DispatchError> {
        Self::unavailable("pointer move")
    }

    fn key_press(&mut self, _keys: &str) -> Result<(), DispatchError> {
        Self::unavailable("key press")
    }
}

static XSET_ACCELERATION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"acceleration:\s*(\d+)/(\d+)"));

/// `acceleration:  2/1    threshold:  4` from the `Pointer Control` block.
pub fn parse_xset_acceleration(text: &str) -> Option<f64> {
    let caps = XSET_ACCELERATION.as_ref().ok()?.captures(text)?;
    let numerator: f64 = caps[1].parse().ok()?;
    let denominator: f64 = caps[2].parse().ok()?;
    if denominator == 0.0 || numerator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}
