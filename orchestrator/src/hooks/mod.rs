//! Hook and control-signal subsystem
//!
//! Lets an external observer steer a running workflow:
//! - callbacks registered per phase, run in priority order
//! - pause / resume / single-step / skip / kill signals
//!
//! The workflow loop calls [`HookController::emit`] at each checkpoint and
//! reacts to the returned [`HookResult`]. The loop knows nothing about the UI
//! that sends the signals.

mod controller;
mod types;

pub use controller::{HookController, HookId, DEFAULT_SIGNAL_QUEUE_CAPACITY};
pub use types::{ControlSignal, HookAction, HookEvent, HookHandler, HookPhase, HookResult};
