//! Touch recognition: raw frames in, gesture lifecycle events out.

pub mod classify;
pub mod engine;
pub mod tracker;
pub mod types;

pub use engine::{EngineOutput, EnginePhase, GestureEngine};
pub use tracker::{Contact, FingerTracker, RawFrame};
