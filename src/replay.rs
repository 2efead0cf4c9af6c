//! Offline replay of recorded frame traces.
//!
//! Time is taken from the trace alone, so the same trace and config always
//! give the same lifecycle events and the same planned actions.

use std::{fmt::Write as _, io::BufRead, sync::Arc};

use anyhow::{bail, Context as _, Result};
use serde::Serialize;

use crate::config::{Config, PointerBackendKind};
use crate::dispatch::{ActionPlanner, DispatchAction, PointerScale};
use crate::gesture::types::LifecycleEvent;
use crate::runtime::Recognizer;
use crate::source::{FrameSource, SourceError, TraceSource};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplayEvent {
    pub t_ms: u64,
    pub instance: u64,
    pub phase: &'static str,
    pub kind: &'static str,
    pub direction: &'static str,
    pub fingers: u8,
    pub delta_x: f64,
    pub delta_y: f64,
    pub scale: f64,
    pub delta_angle: f64,
    pub actions: Vec<DispatchAction>,
}

impl ReplayEvent {
    fn new(event: &LifecycleEvent, actions: Vec<DispatchAction>) -> Self {
        Self {
            t_ms: event.t_ms,
            instance: event.instance_id,
            phase: event.phase.label(),
            kind: event.descriptor.kind.as_str(),
            direction: event.descriptor.direction.as_str(),
            fingers: event.descriptor.fingers,
            delta_x: event.variables.delta_x,
            delta_y: event.variables.delta_y,
            scale: event.variables.scale,
            delta_angle: event.variables.delta_angle,
            actions,
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{:>7} #{} {:<13} {} {} {}f dx={} dy={} scale={} angle={}",
            self.t_ms,
            self.instance,
            self.phase,
            self.kind,
            self.direction,
            self.fingers,
            self.delta_x,
            self.delta_y,
            self.scale,
            self.delta_angle,
        );
        for action in &self.actions {
            let _ = match action {
                DispatchAction::Run { command } => write!(line, " | run `{command}`"),
                DispatchAction::KeyPress { keys } => write!(line, " | key {keys}"),
                DispatchAction::PointerDown => write!(line, " | pointer down"),
                DispatchAction::PointerMove { dx, dy } => write!(line, " | pointer {dx},{dy}"),
                DispatchAction::PointerUp => write!(line, " | pointer up"),
            };
        }
        line
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayReport {
    pub frames: u64,
    pub disconnects: u64,
    pub events: Vec<ReplayEvent>,
}

impl ReplayReport {
    pub fn phases(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.phase).collect()
    }
}

/// Replay a trace. Timers still pending after the last record run to
/// completion, then anything left is cancelled as on shutdown.
pub fn replay<R: BufRead + Send>(config: &Config, reader: R) -> Result<ReplayReport> {
    let bindings = Arc::new(config.bindings.clone());
    let pointer = (config.pointer.backend != PointerBackendKind::None).then_some(PointerScale {
        reference_speed: config.pointer.reference_speed,
        speed_multiplier: config.pointer.default_speed_multiplier,
    });
    let mut planner =
        ActionPlanner::new(Arc::clone(&bindings), pointer).context("failed to build planner")?;
    let mut recognizer = Recognizer::new(bindings, &config.engine);
    let mut source = TraceSource::new(reader);
    let mut report = ReplayReport::default();
    let mut last_ms = 0u64;

    let mut record = |events: Vec<LifecycleEvent>, report: &mut ReplayReport| {
        for event in events {
            let actions = planner.plan(&event);
            report.events.push(ReplayEvent::new(&event, actions));
        }
    };

    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                last_ms = last_ms.max(frame.t_ms);
                record(recognizer.on_frame(&frame), &mut report);
            }
            Ok(None) => break,
            Err(SourceError::Disconnected { t_ms }) => {
                report.disconnects += 1;
                last_ms = last_ms.max(t_ms);
                let mut events = recognizer.advance_to(t_ms);
                events.extend(recognizer.on_source_lost(t_ms));
                record(events, &mut report);
                source.recover().context("trace source failed to recover")?;
            }
            Err(err) => return Err(err).context("failed to read trace"),
        }
    }

    let mut events = recognizer.advance_to(u64::MAX);
    events.extend(recognizer.shutdown(last_ms));
    record(events, &mut report);
    report.frames = recognizer.frames();
    Ok(report)
}

/// Parse an expected phase sequence: whitespace separated `start`, `update`,
/// `end` and `end-cancelled` tokens, `#` starts a comment.
pub fn parse_expectations(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        for token in line.split_whitespace() {
            match token {
                "start" | "update" | "end" | "end-cancelled" => tokens.push(token.to_string()),
                other => bail!("line {}: unknown phase `{other}`", index + 1),
            }
        }
    }
    Ok(tokens)
}

pub fn check_expectations(report: &ReplayReport, expected: &[String]) -> Result<()> {
    let actual = report.phases();
    if let Some(index) = actual
        .iter()
        .zip(expected)
        .position(|(a, e)| *a != e.as_str())
    {
        bail!(
            "event {} is `{}`, expected `{}`",
            index + 1,
            actual[index],
            expected[index]
        );
    }
    if actual.len() != expected.len() {
        bail!(
            "replay produced {} events, expected {}",
            actual.len(),
            expected.len()
        );
    }
    Ok(())
}
