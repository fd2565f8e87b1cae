//! Role-routed multi-agent workflow engine
//!
//! This crate provides:
//! - A keyword router that picks the starting role for a task
//! - The workflow loop that passes work between architect, implementer,
//!   reviewer and navigator agents until one of them says it is done
//! - A hook controller that lets an operator pause, step, skip or kill a
//!   run at fixed checkpoints
//! - Lossy observer channels for progress, handoffs, tokens and code
//! - Agent and store contracts, plus a human-in-the-loop agent and an
//!   in-memory store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::{AgentRegistry, MemoryStore, WorkflowConfig, WorkflowEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! let agents = AgentRegistry::new().with(Arc::new(MyArchitect));
//! let engine = WorkflowEngine::new(agents, Arc::new(MemoryStore::new()), WorkflowConfig::default());
//!
//! let result = engine
//!     .run("Design a rate limiter", &CancellationToken::new())
//!     .await?;
//! ```

pub mod agent;
pub mod engine;
pub mod error;
pub mod events;
pub mod hooks;
pub mod human;
pub mod router;
pub mod store;
pub mod types;

pub use agent::{Agent, AgentRegistry};
pub use engine::{
    WorkflowConfig, WorkflowEngine, WorkflowOutcome, WorkflowResult, DEFAULT_MAX_REVIEW_CYCLES,
};
pub use error::{AgentError, StoreError, WorkflowError};
pub use events::{
    decision_channel, observer_channels, Decision, DecisionRequest, DecisionSender,
    EventReceivers, WorkflowEvents, DEFAULT_EVENT_CAPACITY,
};
pub use hooks::{ControlSignal, HookAction, HookController, HookEvent, HookPhase, HookResult};
pub use human::HumanAgent;
pub use router::Router;
pub use store::{MemoryStore, Store};
pub use types::{
    AgentResponse, Artifacts, Context, Handoff, Metadata, NextRole, Role, Task, TaskStatus,
};
