//! Command dispatch.
//!
//! Lifecycle events cross to a worker thread over a channel; the worker plans
//! actions for each event and executes them in arrival order. Shell commands
//! are spawned without waiting for them, so a hanging command never holds up
//! later events.

use std::{
    process::{Child, Command, Stdio},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gesture::types::LifecycleEvent;

pub mod plan;
pub mod pointer;
pub mod template;

pub use plan::{ActionPlanner, DispatchAction, PointerScale};
pub use pointer::{NullBackend, PointerBackend, XdotoolBackend};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{operation} failed: {reason}")]
    Injection {
        operation: &'static str,
        reason: String,
    },
    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to start dispatch worker: {0}")]
    Worker(#[source] std::io::Error),
    #[error("dispatch worker has stopped")]
    WorkerGone,
}

pub trait CommandRunner: Send {
    /// Start `command` without waiting for it to exit.
    fn run(&mut self, command: &str) -> Result<(), DispatchError>;

    /// Collect finished children, if the runner keeps any.
    fn reap(&mut self) {}
}

/// Runs each command through `sh -c`.
#[derive(Default)]
pub struct ShellRunner {
    children: Vec<Child>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> usize {
        self.children.len()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<(), DispatchError> {
        self.reap();
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                command: command.to_string(),
                source,
            })?;
        debug!(pid = child.id(), command, "dispatch: spawned");
        self.children.push(child);
        Ok(())
    }

    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    debug!(pid = child.id(), %status, "dispatch: command exited");
                }
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(pid = child.id(), %err, "dispatch: failed to poll child");
                false
            }
        });
    }
}

/// Logs commands instead of running them and keeps a copy of each.
#[derive(Clone, Default)]
pub struct DryRunRunner {
    issued: Arc<Mutex<Vec<String>>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&mut self, command: &str) -> Result<(), DispatchError> {
        info!(command, "dispatch: dry run");
        self.issued.lock().push(command.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events: u64,
    pub actions: u64,
    pub failures: u64,
}

/// Executes planned actions against a command runner and an injection
/// backend.
pub struct ActionExecutor {
    runner: Box<dyn CommandRunner>,
    pointer: Box<dyn PointerBackend>,
}

impl ActionExecutor {
    pub fn new(runner: Box<dyn CommandRunner>, pointer: Box<dyn PointerBackend>) -> Self {
        Self { runner, pointer }
    }

    pub fn execute(&mut self, action: &DispatchAction) -> Result<(), DispatchError> {
        match action {
            DispatchAction::Run { command } => self.runner.run(command),
            DispatchAction::KeyPress { keys } => self.pointer.key_press(keys),
            DispatchAction::PointerDown => self.pointer.button_down(),
            DispatchAction::PointerMove { dx, dy } => self.pointer.move_relative(*dx, *dy),
            DispatchAction::PointerUp => self.pointer.button_up(),
        }
    }

    fn base_speed(&mut self) -> Option<f64> {
        self.pointer.base_speed()
    }

    fn reap(&mut self) {
        self.runner.reap();
    }
}

pub struct DispatcherSettings {
    pub reference_speed: f64,
    pub default_speed_multiplier: f64,
    /// Emulate pointer drags for bindings with an acceleration.
    pub inject_pointer: bool,
}

/// Handle to the dispatch worker thread.
pub struct Dispatcher {
    tx: Option<mpsc::Sender<LifecycleEvent>>,
    worker: Option<JoinHandle<DispatchStats>>,
}

impl Dispatcher {
    pub fn spawn(
        mut planner: ActionPlanner,
        mut executor: ActionExecutor,
        settings: DispatcherSettings,
    ) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::channel::<LifecycleEvent>();
        let worker = thread::Builder::new()
            .name("gestured-dispatch".to_string())
            .spawn(move || {
                if settings.inject_pointer {
                    let speed_multiplier = executor.base_speed().unwrap_or_else(|| {
                        debug!(
                            fallback = settings.default_speed_multiplier,
                            "dispatch: pointer speed unavailable"
                        );
                        settings.default_speed_multiplier
                    });
                    planner.set_pointer_scale(Some(PointerScale {
                        reference_speed: settings.reference_speed,
                        speed_multiplier,
                    }));
                } else {
                    planner.set_pointer_scale(None);
                }
                run_worker(rx, planner, executor)
            })
            .map_err(DispatchError::Worker)?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn send(&self, event: LifecycleEvent) -> Result<(), DispatchError> {
        let tx = self.tx.as_ref().ok_or(DispatchError::WorkerGone)?;
        tx.send(event).map_err(|_| DispatchError::WorkerGone)
    }

    /// Close the channel, let the worker drain queued events, and join it.
    pub fn shutdown(mut self) -> DispatchStats {
        self.finish()
    }

    fn finish(&mut self) -> DispatchStats {
        self.tx.take();
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("dispatch: worker panicked");
                DispatchStats::default()
            }
            None => DispatchStats::default(),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.finish();
        }
    }
}

fn run_worker(
    rx: mpsc::Receiver<LifecycleEvent>,
    mut planner: ActionPlanner,
    mut executor: ActionExecutor,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    for event in rx {
        stats.events += 1;
        for action in planner.plan(&event) {
            stats.actions += 1;
            if let Err(err) = executor.execute(&action) {
                stats.failures += 1;
                warn!(
                    id = event.instance_id,
                    phase = event.phase.label(),
                    %err,
                    "dispatch: action failed"
                );
            }
        }
        executor.reap();
    }
    debug!(?stats, "dispatch: worker drained");
    stats
}

#[cfg(test)]
mod tests;
