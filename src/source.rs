//! Touch frame sources.
//!
//! The line format is the one the replay tool and `run --input` read:
//!
//! ```text
//! # comment
//! frame,<t_ms>[,<slot>:<x>:<y>]...
//! disconnect,<t_ms>
//! ```
//!
//! A frame with no contacts means every finger is up.

use std::{
    io::BufRead,
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::trace;

use crate::gesture::tracker::{Contact, RawFrame};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("touch source disconnected at {t_ms} ms")]
    Disconnected { t_ms: u64 },
    #[error("touch source cannot recover: {0}")]
    Unrecoverable(String),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("failed to read touch source: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether [`FrameSource::recover`] is worth calling after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError>;

    /// Re-establish the stream after a transient failure.
    fn recover(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceLine {
    Frame(RawFrame),
    Disconnect { t_ms: u64 },
}

/// `Ok(None)` for blank and comment lines.
pub fn parse_trace_line(text: &str) -> Result<Option<TraceLine>, String> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let mut fields = text.split(',').map(str::trim);
    let tag = fields.next().unwrap_or_default();
    let t_ms = fields
        .next()
        .ok_or_else(|| format!("`{tag}` needs a timestamp"))?;
    let t_ms: u64 = t_ms
        .parse()
        .map_err(|_| format!("invalid timestamp `{t_ms}`"))?;

    match tag {
        "frame" => {
            let contacts = fields
                .filter(|field| !field.is_empty())
                .map(parse_contact)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(TraceLine::Frame(RawFrame { t_ms, contacts })))
        }
        "disconnect" => {
            if let Some(extra) = fields.next() {
                return Err(format!("unexpected field `{extra}` after disconnect"));
            }
            Ok(Some(TraceLine::Disconnect { t_ms }))
        }
        other => Err(format!("unknown record `{other}`")),
    }
}

fn parse_contact(field: &str) -> Result<Contact, String> {
    let mut parts = field.split(':');
    let (Some(slot), Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("contact `{field}` is not <slot>:<x>:<y>"));
    };
    let slot: u8 = slot
        .parse()
        .map_err(|_| format!("invalid slot in `{field}`"))?;
    let x: f64 = x.parse().map_err(|_| format!("invalid x in `{field}`"))?;
    let y: f64 = y.parse().map_err(|_| format!("invalid y in `{field}`"))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(format!("non-finite position in `{field}`"));
    }
    Ok(Contact { slot, x, y })
}

/// Reads frames from a line-oriented trace.
///
/// With pacing enabled, frames are released at their recorded spacing, which
/// is how a live device would deliver them.
pub struct TraceSource<R> {
    reader: R,
    line_no: usize,
    buf: String,
    paced: bool,
    epoch: Option<(Instant, u64)>,
}

impl<R: BufRead + Send> TraceSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            paced: false,
            epoch: None,
        }
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    fn pace(&mut self, t_ms: u64) {
        if !self.paced {
            return;
        }
        let (start, first_ms) = *self.epoch.get_or_insert((Instant::now(), t_ms));
        let due = start + Duration::from_millis(t_ms.saturating_sub(first_ms));
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

impl<R: BufRead + Send> FrameSource for TraceSource<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let parsed = parse_trace_line(&self.buf).map_err(|reason| SourceError::Parse {
                line: self.line_no,
                reason,
            })?;
            match parsed {
                None => continue,
                Some(TraceLine::Frame(frame)) => {
                    self.pace(frame.t_ms);
                    trace!(t_ms = frame.t_ms, contacts = frame.contacts.len(), "source: frame");
                    return Ok(Some(frame));
                }
                Some(TraceLine::Disconnect { t_ms }) => {
                    self.pace(t_ms);
                    return Err(SourceError::Disconnected { t_ms });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
