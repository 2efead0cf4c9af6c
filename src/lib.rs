//! Touchpad gesture recognition and dispatch.
//!
//! Frames from a [`source::FrameSource`] pass through the finger tracker and
//! the lifecycle engine in [`gesture`]; the resulting start/update/end events
//! are turned into shell commands and pointer actions by [`dispatch`].

pub mod binding;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod replay;
pub mod runtime;
pub mod source;
