use std::{collections::VecDeque, time::Instant};

use parking_lot::{Condvar, Mutex};

use crate::gesture::tracker::RawFrame;

#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Frame(RawFrame),
    SourceLost { t_ms: u64 },
    /// The source ended or failed.
    Closed,
    /// Stop requested from outside, e.g. by a signal.
    Interrupted,
}

struct QueueState {
    items: VecDeque<Input>,
    coalesced: u64,
}

/// Bounded hand-off from the ingestion thread to the recognition loop.
///
/// `push` never blocks. When full, a frame replaces the newest queued frame
/// if both have the same contact count; otherwise the oldest frame that
/// repeats its predecessor's count is evicted. Count transitions and control
/// inputs are never dropped, so the queue may briefly exceed its capacity.
pub struct FrameQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                coalesced: 0,
            }),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, input: Input) {
        let mut state = self.state.lock();
        if state.items.len() >= self.capacity {
            if let Input::Frame(frame) = &input {
                if coalesce(&mut state.items, frame) {
                    state.coalesced += 1;
                    self.ready.notify_one();
                    return;
                }
            }
        }
        state.items.push_back(input);
        self.ready.notify_one();
    }

    /// Next input, waiting until `deadline` (or forever when `None`).
    /// Returns `None` when the deadline passes first.
    pub fn pop_until(&self, deadline: Option<Instant>) -> Option<Input> {
        let mut state = self.state.lock();
        loop {
            if let Some(input) = state.items.pop_front() {
                return Some(input);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    self.ready.wait_until(&mut state, deadline);
                }
                None => self.ready.wait(&mut state),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped or merged so far.
    pub fn coalesced(&self) -> u64 {
        self.state.lock().coalesced
    }
}

fn frame_count(input: &Input) -> Option<usize> {
    match input {
        Input::Frame(frame) => Some(frame.contacts.len()),
        _ => None,
    }
}

fn coalesce(items: &mut VecDeque<Input>, frame: &RawFrame) -> bool {
    let count = frame.contacts.len();
    if let Some(last) = items.back_mut() {
        if frame_count(last) == Some(count) {
            *last = Input::Frame(frame.clone());
            return true;
        }
    }
    let redundant = (1..items.len()).find(|&i| {
        let current = frame_count(&items[i]);
        current.is_some() && current == frame_count(&items[i - 1])
    });
    match redundant {
        Some(index) => {
            items.remove(index);
            items.push_back(Input::Frame(frame.clone()));
            true
        }
        None => false,
    }
}
