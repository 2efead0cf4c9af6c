//! Daemon runtime: ingestion thread, recognition loop, dispatch worker.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context as _, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, RuntimeSettings};
use crate::dispatch::{ActionExecutor, ActionPlanner, DispatchStats, Dispatcher, DispatcherSettings};
use crate::gesture::types::{CancelReason, LifecycleEvent};
use crate::source::{FrameSource, SourceError};

mod queue;
mod recognizer;

pub use queue::{FrameQueue, Input};
pub use recognizer::Recognizer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub gestures: u64,
    pub coalesced: u64,
    pub dispatch: DispatchStats,
}

/// Maps device timestamps onto the wall clock so deadlines can be waited
/// for between frames.
struct SessionClock {
    last_frame_ms: u64,
    last_frame_at: Instant,
}

impl SessionClock {
    fn new() -> Self {
        Self {
            last_frame_ms: 0,
            last_frame_at: Instant::now(),
        }
    }

    fn observe(&mut self, t_ms: u64) {
        self.last_frame_ms = self.last_frame_ms.max(t_ms);
        self.last_frame_at = Instant::now();
    }

    fn now_ms(&self) -> u64 {
        let elapsed = self.last_frame_at.elapsed().as_millis();
        self.last_frame_ms
            .saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    fn instant_for(&self, t_ms: u64) -> Instant {
        self.last_frame_at + Duration::from_millis(t_ms.saturating_sub(self.last_frame_ms))
    }
}

/// Stops a running [`Daemon`] from another thread or a signal handler.
#[derive(Clone)]
pub struct StopHandle {
    queue: Arc<FrameQueue>,
}

impl StopHandle {
    /// Any live gesture is cancelled and its `end` dispatched before
    /// [`Daemon::run`] returns.
    pub fn stop(&self) {
        self.queue.push(Input::Interrupted);
    }
}

/// One recognition session. The queue exists before the run starts so a
/// [`StopHandle`] can be handed out first.
pub struct Daemon {
    queue: Arc<FrameQueue>,
}

impl Daemon {
    pub fn new(settings: &RuntimeSettings) -> Self {
        Self {
            queue: Arc::new(FrameQueue::new(settings.queue_capacity)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Run until the source ends or a stop is requested. Any gesture still
    /// live at that point is cancelled and its `end` dispatched before this
    /// returns.
    pub fn run<S>(
        self,
        config: &Config,
        source: S,
        executor: ActionExecutor,
        inject_pointer: bool,
    ) -> Result<RunSummary>
    where
        S: FrameSource + 'static,
    {
        let queue = self.queue;
        let bindings = Arc::new(config.bindings.clone());
        let planner = ActionPlanner::new(Arc::clone(&bindings), None)
            .context("failed to build command planner")?;
        let dispatcher = Dispatcher::spawn(
            planner,
            executor,
            DispatcherSettings {
                reference_speed: config.pointer.reference_speed,
                default_speed_multiplier: config.pointer.default_speed_multiplier,
                inject_pointer,
            },
        )
        .context("failed to start dispatcher")?;

        let ingest = spawn_ingest(source, Arc::clone(&queue), config.runtime.clone())
            .context("failed to start ingestion thread")?;

        info!(bindings = bindings.len(), "runtime: started");
        let mut recognizer = Recognizer::new(bindings, &config.engine);
        let mut clock = SessionClock::new();
        let mut interrupted = false;

        loop {
            let deadline = recognizer.next_deadline_ms();
            let input = queue.pop_until(deadline.map(|t| clock.instant_for(t)));
            let events = match input {
                Some(Input::Frame(frame)) => {
                    clock.observe(frame.t_ms);
                    recognizer.on_frame(&frame)
                }
                Some(Input::SourceLost { t_ms }) => {
                    clock.observe(t_ms);
                    recognizer.on_source_lost(clock.now_ms())
                }
                Some(Input::Closed) => {
                    let events = recognizer.shutdown(clock.now_ms());
                    forward(&dispatcher, events);
                    break;
                }
                Some(Input::Interrupted) => {
                    info!("runtime: stop requested");
                    let events = recognizer.cancel(clock.now_ms(), CancelReason::External);
                    forward(&dispatcher, events);
                    interrupted = true;
                    break;
                }
                None => {
                    // Millisecond rounding must not leave the deadline unfired.
                    let now_ms = clock.now_ms().max(deadline.unwrap_or_default());
                    recognizer.on_timer(now_ms)
                }
            };
            forward(&dispatcher, events);
        }

        let dispatch = dispatcher.shutdown();
        let summary = RunSummary {
            frames: recognizer.frames(),
            gestures: recognizer.gestures(),
            coalesced: queue.coalesced(),
            dispatch,
        };
        info!(?summary, "runtime: stopped");

        if interrupted {
            // The ingest thread may sit in a blocking read; it is left behind.
            return Ok(summary);
        }
        match ingest.join() {
            Ok(Ok(())) => Ok(summary),
            Ok(Err(err)) => Err(anyhow::Error::new(err).context("touch source failed")),
            Err(_) => Err(anyhow!("ingestion thread panicked")),
        }
    }
}

/// [`Daemon::run`] without a stop handle.
pub fn run<S>(
    config: &Config,
    source: S,
    executor: ActionExecutor,
    inject_pointer: bool,
) -> Result<RunSummary>
where
    S: FrameSource + 'static,
{
    Daemon::new(&config.runtime).run(config, source, executor, inject_pointer)
}

fn forward(dispatcher: &Dispatcher, events: Vec<LifecycleEvent>) {
    for event in events {
        if let Err(err) = dispatcher.send(event) {
            warn!(%err, id = event.instance_id, "runtime: event dropped");
        }
    }
}

fn spawn_ingest<S>(
    mut source: S,
    queue: Arc<FrameQueue>,
    settings: RuntimeSettings,
) -> std::io::Result<JoinHandle<Result<(), SourceError>>>
where
    S: FrameSource + 'static,
{
    thread::Builder::new()
        .name("gestured-ingest".to_string())
        .spawn(move || {
            let result = ingest_loop(&mut source, &queue, &settings);
            queue.push(Input::Closed);
            result
        })
}

fn ingest_loop<S: FrameSource>(
    source: &mut S,
    queue: &FrameQueue,
    settings: &RuntimeSettings,
) -> Result<(), SourceError> {
    loop {
        match source.next_frame() {
            Ok(Some(frame)) => queue.push(Input::Frame(frame)),
            Ok(None) => {
                debug!("ingest: source ended");
                return Ok(());
            }
            Err(err) if err.is_transient() => {
                warn!(%err, "ingest: source lost");
                let t_ms = match err {
                    SourceError::Disconnected { t_ms } => t_ms,
                    _ => 0,
                };
                queue.push(Input::SourceLost { t_ms });
                reconnect(source, settings)?;
            }
            Err(err) => {
                warn!(%err, "ingest: source failed");
                return Err(err);
            }
        }
    }
}

fn reconnect<S: FrameSource>(source: &mut S, settings: &RuntimeSettings) -> Result<(), SourceError> {
    let mut last_err = None;
    for attempt in 1..=settings.max_reconnect_attempts.max(1) {
        match source.recover() {
            Ok(()) => {
                info!(attempt, "ingest: source recovered");
                return Ok(());
            }
            Err(err) => {
                debug!(attempt, %err, "ingest: reconnect failed");
                last_err = Some(err);
                thread::sleep(Duration::from_millis(settings.reconnect_backoff_ms));
            }
        }
    }
    Err(SourceError::Unrecoverable(match last_err {
        Some(err) => format!("gave up after {} attempts: {err}", settings.max_reconnect_attempts),
        None => "gave up reconnecting".to_string(),
    }))
}
